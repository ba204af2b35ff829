//! Scope-based authorization
//!
//! Provides:
//! - Suffix-wildcard pattern matching for resources and actions
//! - Namespaced scopes
//! - A pure authorizer deciding whether held scopes cover requested ones

mod engine;
mod pattern;
mod scope;

pub use engine::{Decision, ScopeAuthorizer};
pub use pattern::PatternMatcher;
pub use scope::Scope;
