//! Scope authorization
//!
//! Decides whether a set of held scopes covers a set of requested scopes.
//! Pure and deterministic: no I/O, no caching, no clock.
//!
//! Rules:
//! - An empty request is always authorized
//! - A requested scope is only ever compared with held scopes of the identical namespace
//! - Every `(resource, action)` pair of every requested scope must be covered,
//!   and a pair is covered only when one held scope matches both halves
//! - There are no deny statements, so the first uncovered pair decides the outcome

use super::Scope;

/// Outcome of an authorization check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Every requested pair is covered
    Allow,
    /// The first uncovered pair found
    Deny {
        namespace: String,
        resource: String,
        action: String,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Scope authorizer
pub struct ScopeAuthorizer;

impl ScopeAuthorizer {
    /// Check whether `held` covers every pair in `requested`
    ///
    /// # Examples
    ///
    /// ```
    /// use bastion_iam::{Scope, ScopeAuthorizer};
    ///
    /// let held = vec![Scope::new(
    ///     "shop",
    ///     vec!["orders*".to_string()],
    ///     vec!["read".to_string()],
    /// )];
    /// let ok = vec![Scope::new("shop", vec!["orders/7".to_string()], vec!["read".to_string()])];
    /// let other_ns = vec![Scope::new("", vec!["orders/7".to_string()], vec!["read".to_string()])];
    ///
    /// assert!(ScopeAuthorizer::authorize(&held, &ok));
    /// assert!(!ScopeAuthorizer::authorize(&held, &other_ns));
    /// assert!(ScopeAuthorizer::authorize(&held, &[]));
    /// ```
    pub fn authorize(held: &[Scope], requested: &[Scope]) -> bool {
        Self::evaluate(held, requested).is_allowed()
    }

    /// Like [`ScopeAuthorizer::authorize`], but reports the first uncovered pair
    pub fn evaluate(held: &[Scope], requested: &[Scope]) -> Decision {
        for request in requested {
            let candidates: Vec<&Scope> = held
                .iter()
                .filter(|h| h.namespace == request.namespace)
                .collect();

            for (resource, action) in request.pairs() {
                let covered = candidates
                    .iter()
                    .any(|h| h.covers(&request.namespace, resource, action));

                if !covered {
                    return Decision::Deny {
                        namespace: request.namespace.clone(),
                        resource: resource.to_string(),
                        action: action.to_string(),
                    };
                }
            }
        }

        Decision::Allow
    }
}
