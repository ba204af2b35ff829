//! Scope: a namespaced bundle of resource and action patterns
//!
//! The same shape serves both sides of an authorization check. Held scopes
//! carry patterns (`orders*`), requested scopes carry concrete names, though
//! nothing stops a request from containing a `*` literal.

use super::PatternMatcher;
use serde::{Deserialize, Serialize};

/// A capability bundle bound to exactly one namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Namespace the scope applies to (`""` is the global namespace)
    pub namespace: String,

    /// Resource names or patterns
    pub resources: Vec<String>,

    /// Action names or patterns
    pub actions: Vec<String>,
}

impl Scope {
    /// Create a new scope
    pub fn new(namespace: impl Into<String>, resources: Vec<String>, actions: Vec<String>) -> Self {
        Scope {
            namespace: namespace.into(),
            resources,
            actions,
        }
    }

    /// Check if this scope grants `action` on `resource` within `namespace`
    ///
    /// The resource and the action must both be matched by this one scope.
    pub fn covers(&self, namespace: &str, resource: &str, action: &str) -> bool {
        self.namespace == namespace
            && PatternMatcher::any_matches(&self.resources, resource)
            && PatternMatcher::any_matches(&self.actions, action)
    }

    /// Every `(resource, action)` pair this scope names
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.resources.iter().flat_map(move |resource| {
            self.actions
                .iter()
                .map(move |action| (resource.as_str(), action.as_str()))
        })
    }
}
