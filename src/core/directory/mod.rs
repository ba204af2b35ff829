//! Namespace-partitioned directory of identities, policies and tokens
//!
//! Each entity kind lives in its own collection inside the namespace's
//! partition and is fronted by a TTL cache:
//! - `get(.., use_cache = true)` serves a live cache entry, or reads the
//!   partition and fills the cache
//! - every mutation writes the partition first and then deletes every cache
//!   key mirroring the entity, primary and secondary
//!
//! Malformed identifiers are rejected before any round trip. A missing record
//! and a missing namespace are both `NotFound`; a missing dependency (target
//! namespace on create, a policy being attached) is `FailedPrecondition`.

mod cache;
mod identity;
mod partition;
mod policy;
mod token;

pub use identity::IdentityRepository;
pub use policy::PolicyRepository;
pub use token::TokenRepository;

use crate::core::error::Result;
use crate::core::iam::Scope;
use crate::core::storage::{Cache, DocumentStore, NamespaceRegistry};
use cache::CacheAside;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use partition::Partitions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Reference to a policy, possibly in another namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyRef {
    pub namespace: String,
    pub uuid: Uuid,
}

impl PolicyRef {
    pub fn new(namespace: impl Into<String>, uuid: Uuid) -> Self {
        PolicyRef {
            namespace: namespace.into(),
            uuid,
        }
    }
}

impl fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.uuid)
    }
}

/// A principal that holds policies and receives tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub namespace: String,

    /// Assigned at creation, never changes
    pub uuid: Uuid,

    pub name: String,

    /// Optional login, unique within the namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,

    pub active: bool,

    /// Attached policies (no duplicates)
    #[serde(default)]
    pub policies: BTreeSet<PolicyRef>,

    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Build an unsaved identity with a fresh uuid and no policies
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        login: Option<String>,
        active: bool,
    ) -> Self {
        Identity {
            namespace: namespace.into(),
            uuid: Uuid::new_v4(),
            name: name.into(),
            login,
            active,
            policies: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }
}

/// A named, assignable grant of resource and action patterns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Fixed at creation
    pub namespace: String,
    pub uuid: Uuid,
    pub name: String,
    pub resources: Vec<String>,
    pub actions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Policy {
    /// Flatten this policy 1:1 into a scope of its own namespace
    pub fn to_scope(&self) -> Scope {
        Scope::new(
            self.namespace.clone(),
            self.resources.clone(),
            self.actions.clone(),
        )
    }

    pub fn reference(&self) -> PolicyRef {
        PolicyRef::new(self.namespace.clone(), self.uuid)
    }
}

/// Persistent half of an access/refresh token pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub namespace: String,
    pub uuid: Uuid,

    /// Identity the token was issued to (same namespace)
    pub identity: Uuid,

    /// One-way: once set it is never cleared
    pub disabled: bool,

    pub expires_at: DateTime<Utc>,

    /// Scope snapshot taken at issue time; never mutated
    pub scopes: Vec<Scope>,

    pub created_at: DateTime<Utc>,

    /// Opaque caller-supplied string recorded at creation
    #[serde(default)]
    pub creation_metadata: String,
}

impl TokenData {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Neither disabled nor expired
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.disabled && !self.is_expired(now)
    }
}

/// Token listing filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActiveFilter {
    #[default]
    All,
    OnlyActive,
    OnlyNotActive,
}

impl ActiveFilter {
    pub fn admits(&self, token: &TokenData, now: DateTime<Utc>) -> bool {
        match self {
            ActiveFilter::All => true,
            ActiveFilter::OnlyActive => token.is_active(now),
            ActiveFilter::OnlyNotActive => !token.is_active(now),
        }
    }
}

/// Fields for a new identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewIdentity {
    pub name: String,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub policies: Vec<PolicyRef>,
}

/// Partial identity update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityPatch {
    pub name: Option<String>,
    pub login: Option<String>,
}

/// Fields for a new policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPolicy {
    pub name: String,
    pub resources: Vec<String>,
    pub actions: Vec<String>,
}

/// Partial policy update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyPatch {
    pub name: Option<String>,
    pub resources: Option<Vec<String>>,
    pub actions: Option<Vec<String>>,
}

/// Facade over the three repositories sharing one store and one cache
#[derive(Clone)]
pub struct Directory {
    partitions: Partitions,
    identities: IdentityRepository,
    policies: PolicyRepository,
    tokens: TokenRepository,
}

impl Directory {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        namespaces: Arc<dyn NamespaceRegistry>,
        cache: Arc<dyn Cache>,
        cache_ttl: Duration,
    ) -> Self {
        let partitions = Partitions::new(store, namespaces);
        let cache = CacheAside::new(cache, cache_ttl);

        Directory {
            identities: IdentityRepository::new(partitions.clone(), cache.clone()),
            policies: PolicyRepository::new(partitions.clone(), cache.clone()),
            tokens: TokenRepository::new(partitions.clone(), cache),
            partitions,
        }
    }

    pub fn identities(&self) -> &IdentityRepository {
        &self.identities
    }

    pub fn policies(&self) -> &PolicyRepository {
        &self.policies
    }

    pub fn tokens(&self) -> &TokenRepository {
        &self.tokens
    }

    pub async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        crate::core::validation::validate_namespace(namespace)?;
        self.partitions.namespace_exists(namespace).await
    }

    /// Tear down a namespace through the registry
    ///
    /// Every record inside disappears at once. Cache entries are not
    /// enumerated; cached reads may still serve them until their TTL runs out.
    pub async fn drop_namespace(&self, namespace: &str) -> Result<()> {
        crate::core::validation::validate_namespace(namespace)?;
        self.partitions.drop_namespace(namespace).await?;
        info!(namespace, "namespace dropped");
        Ok(())
    }

    /// Resolve an identity's current policies into scopes, one per policy
    ///
    /// Policies are fetched concurrently and bypass the cache. References to
    /// policies deleted after attachment are skipped.
    pub async fn flatten_policies(&self, identity: &Identity) -> Result<Vec<Scope>> {
        let lookups = identity
            .policies
            .iter()
            .map(|r| self.policies.lookup(&r.namespace, r.uuid, false));

        let resolved = try_join_all(lookups).await?;

        Ok(identity
            .policies
            .iter()
            .zip(resolved)
            .filter_map(|(reference, policy)| match policy {
                Some(policy) => Some(policy.to_scope()),
                None => {
                    warn!(
                        identity = %identity.uuid,
                        policy = %reference,
                        "skipping dangling policy reference"
                    );
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn token(disabled: bool, expires_in: i64) -> TokenData {
        let now = Utc::now();
        TokenData {
            namespace: String::new(),
            uuid: Uuid::new_v4(),
            identity: Uuid::new_v4(),
            disabled,
            expires_at: now + ChronoDuration::seconds(expires_in),
            scopes: Vec::new(),
            created_at: now,
            creation_metadata: String::new(),
        }
    }

    #[test]
    fn test_token_activity() {
        let now = Utc::now();
        assert!(token(false, 60).is_active(now));
        assert!(!token(true, 60).is_active(now));
        assert!(!token(false, -1).is_active(now));
        assert!(token(false, -1).is_expired(now));
    }

    #[test]
    fn test_active_filter() {
        let now = Utc::now();
        let active = token(false, 60);
        let disabled = token(true, 60);
        let expired = token(false, -60);

        assert!(ActiveFilter::All.admits(&disabled, now));
        assert!(ActiveFilter::OnlyActive.admits(&active, now));
        assert!(!ActiveFilter::OnlyActive.admits(&expired, now));
        assert!(ActiveFilter::OnlyNotActive.admits(&disabled, now));
        assert!(ActiveFilter::OnlyNotActive.admits(&expired, now));
        assert!(!ActiveFilter::OnlyNotActive.admits(&active, now));
    }

    #[test]
    fn test_policy_flattens_to_scope() {
        let policy = Policy {
            namespace: "ns".into(),
            uuid: Uuid::new_v4(),
            name: "readers".into(),
            resources: vec!["docs*".into()],
            actions: vec!["read".into()],
            created_at: Utc::now(),
        };
        let scope = policy.to_scope();
        assert_eq!(scope.namespace, "ns");
        assert_eq!(scope.resources, policy.resources);
        assert_eq!(scope.actions, policy.actions);
        assert_eq!(policy.reference(), PolicyRef::new("ns", policy.uuid));
    }

    #[test]
    fn test_identity_login_omitted_when_absent() {
        let identity = Identity::new("", "svc", None, true);
        let json = serde_json::to_value(&identity).unwrap();
        assert!(json.get("login").is_none());

        let back: Identity = serde_json::from_value(json).unwrap();
        assert_eq!(back, identity);
    }
}
