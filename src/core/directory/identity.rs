//! Identity repository
//!
//! Identities are cached under two keys: the uuid and, when set, the login.
//! Every mutation deletes both (and the previous login key on a login change).

use super::cache::{identity_key, identity_login_key, CacheAside};
use super::partition::Partitions;
use super::{Identity, IdentityPatch, NewIdentity, Policy, PolicyRef};
use crate::core::error::{IamError, Result};
use crate::core::storage::{Collection, FieldEq, Query};
use crate::core::validation::{parse_uuid, validate_name, validate_namespace};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct IdentityRepository {
    partitions: Partitions,
    cache: CacheAside,
}

impl IdentityRepository {
    pub(crate) fn new(partitions: Partitions, cache: CacheAside) -> Self {
        IdentityRepository { partitions, cache }
    }

    /// Create an identity in an existing namespace
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a bad namespace, name, login or policy reference
    /// - `FailedPrecondition` if the namespace or any attached policy is missing
    /// - `AlreadyExists` if the login is taken in this namespace
    pub async fn create(&self, namespace: &str, new: NewIdentity) -> Result<Identity> {
        validate_namespace(namespace)?;
        validate_name("name", &new.name)?;
        if let Some(login) = &new.login {
            validate_name("login", login)?;
        }
        for reference in &new.policies {
            validate_namespace(&reference.namespace)?;
        }

        self.partitions.require_namespace(namespace).await?;

        if let Some(login) = &new.login {
            if self.find_by_login(namespace, login).await?.is_some() {
                return Err(IamError::AlreadyExists(format!(
                    "login '{}' is already taken in namespace '{}'",
                    login, namespace
                )));
            }
        }

        for reference in &new.policies {
            self.require_policy(reference).await?;
        }

        let mut identity = Identity::new(namespace, new.name, new.login, new.active);
        identity.policies = new.policies.into_iter().collect();

        self.partitions
            .insert(namespace, Collection::Identities, identity.uuid, &identity)
            .await?;

        info!(
            namespace,
            uuid = %identity.uuid,
            policies = identity.policies.len(),
            "identity created"
        );
        Ok(identity)
    }

    /// Fetch an identity by its textual uuid
    pub async fn get(&self, namespace: &str, uuid: &str, use_cache: bool) -> Result<Identity> {
        let uuid = parse_uuid("identity uuid", uuid)?;
        validate_namespace(namespace)?;

        self.lookup(namespace, uuid, use_cache).await?.ok_or_else(|| {
            IamError::not_found(format!("identity {} in namespace '{}'", uuid, namespace))
        })
    }

    /// Fetch an identity, `None` if it (or its namespace) does not exist
    pub async fn lookup(&self, namespace: &str, uuid: Uuid, use_cache: bool) -> Result<Option<Identity>> {
        let key = identity_key(namespace, uuid);

        if use_cache {
            if let Some(identity) = self.cache.fetch::<Identity>(&key).await? {
                return Ok(Some(identity));
            }
        }

        let identity: Option<Identity> = self
            .partitions
            .load(namespace, Collection::Identities, uuid)
            .await?;

        if use_cache {
            if let Some(identity) = &identity {
                self.cache.fill(&key, identity).await?;
            }
        }

        Ok(identity)
    }

    /// Fetch an identity by login through the secondary cache key
    pub async fn get_by_login(&self, namespace: &str, login: &str, use_cache: bool) -> Result<Identity> {
        validate_namespace(namespace)?;
        validate_name("login", login)?;

        let key = identity_login_key(namespace, login);
        if use_cache {
            if let Some(identity) = self.cache.fetch::<Identity>(&key).await? {
                return Ok(identity);
            }
        }

        let identity = self.find_by_login(namespace, login).await?.ok_or_else(|| {
            IamError::not_found(format!(
                "identity with login '{}' in namespace '{}'",
                login, namespace
            ))
        })?;

        if use_cache {
            self.cache.fill(&key, &identity).await?;
        }
        Ok(identity)
    }

    /// Rename an identity and/or change its login
    pub async fn update(&self, namespace: &str, uuid: &str, patch: IdentityPatch) -> Result<Identity> {
        let uuid = parse_uuid("identity uuid", uuid)?;
        validate_namespace(namespace)?;
        if let Some(name) = &patch.name {
            validate_name("name", name)?;
        }
        if let Some(login) = &patch.login {
            validate_name("login", login)?;
        }

        let mut identity = self.load(namespace, uuid).await?;
        let previous_login = identity.login.clone();

        if let Some(login) = &patch.login {
            if identity.login.as_deref() != Some(login.as_str()) {
                if let Some(other) = self.find_by_login(namespace, login).await? {
                    if other.uuid != uuid {
                        return Err(IamError::AlreadyExists(format!(
                            "login '{}' is already taken in namespace '{}'",
                            login, namespace
                        )));
                    }
                }
            }
        }

        if let Some(name) = patch.name {
            identity.name = name;
        }
        if let Some(login) = patch.login {
            identity.login = Some(login);
        }

        self.store(&identity).await?;

        let mut keys = self.keys_for(&identity);
        if let Some(previous) = previous_login {
            keys.push(identity_login_key(namespace, &previous));
        }
        self.cache.invalidate(&keys).await?;

        debug!(namespace, uuid = %uuid, "identity updated");
        Ok(identity)
    }

    /// Attach a policy (idempotent)
    ///
    /// # Errors
    ///
    /// `NotFound` if the identity is missing, `FailedPrecondition` if the policy is.
    pub async fn add_policy(&self, namespace: &str, uuid: &str, policy: PolicyRef) -> Result<Identity> {
        let uuid = parse_uuid("identity uuid", uuid)?;
        validate_namespace(namespace)?;
        validate_namespace(&policy.namespace)?;

        let mut identity = self.load(namespace, uuid).await?;
        self.require_policy(&policy).await?;

        if identity.policies.insert(policy.clone()) {
            self.store(&identity).await?;
            debug!(namespace, uuid = %uuid, policy = %policy, "policy attached");
        }
        self.cache.invalidate(&self.keys_for(&identity)).await?;

        Ok(identity)
    }

    /// Detach a policy (idempotent)
    pub async fn remove_policy(&self, namespace: &str, uuid: &str, policy: PolicyRef) -> Result<Identity> {
        let uuid = parse_uuid("identity uuid", uuid)?;
        validate_namespace(namespace)?;
        validate_namespace(&policy.namespace)?;

        let mut identity = self.load(namespace, uuid).await?;

        if identity.policies.remove(&policy) {
            self.store(&identity).await?;
            debug!(namespace, uuid = %uuid, policy = %policy, "policy detached");
        }
        self.cache.invalidate(&self.keys_for(&identity)).await?;

        Ok(identity)
    }

    /// Activate or deactivate an identity
    pub async fn set_active(&self, namespace: &str, uuid: &str, active: bool) -> Result<Identity> {
        let uuid = parse_uuid("identity uuid", uuid)?;
        validate_namespace(namespace)?;

        let mut identity = self.load(namespace, uuid).await?;
        identity.active = active;
        self.store(&identity).await?;
        self.cache.invalidate(&self.keys_for(&identity)).await?;

        info!(namespace, uuid = %uuid, active, "identity activity changed");
        Ok(identity)
    }

    /// Delete an identity; a missing identity is a no-op
    pub async fn delete(&self, namespace: &str, uuid: &str) -> Result<()> {
        let uuid = parse_uuid("identity uuid", uuid)?;
        validate_namespace(namespace)?;

        let existing: Option<Identity> = self
            .partitions
            .load(namespace, Collection::Identities, uuid)
            .await?;

        self.partitions
            .remove(namespace, Collection::Identities, uuid)
            .await?;

        let keys = match &existing {
            Some(identity) => self.keys_for(identity),
            None => vec![identity_key(namespace, uuid)],
        };
        self.cache.invalidate(&keys).await?;

        if existing.is_some() {
            info!(namespace, uuid = %uuid, "identity deleted");
        }
        Ok(())
    }

    /// List identities in creation order; `limit == 0` means unbounded
    pub async fn list(&self, namespace: &str, skip: usize, limit: usize) -> Result<Vec<Identity>> {
        validate_namespace(namespace)?;
        self.partitions
            .find(namespace, Collection::Identities, &Query::all().page(skip, limit))
            .await
    }

    async fn load(&self, namespace: &str, uuid: Uuid) -> Result<Identity> {
        self.partitions
            .load(namespace, Collection::Identities, uuid)
            .await?
            .ok_or_else(|| {
                IamError::not_found(format!("identity {} in namespace '{}'", uuid, namespace))
            })
    }

    async fn store(&self, identity: &Identity) -> Result<()> {
        let replaced = self
            .partitions
            .replace(&identity.namespace, Collection::Identities, identity.uuid, identity)
            .await?;
        if !replaced {
            return Err(IamError::not_found(format!(
                "identity {} in namespace '{}'",
                identity.uuid, identity.namespace
            )));
        }
        Ok(())
    }

    async fn find_by_login(&self, namespace: &str, login: &str) -> Result<Option<Identity>> {
        let query = Query::all()
            .with_filter(FieldEq::new("login", login))
            .page(0, 1);
        let mut found: Vec<Identity> = self
            .partitions
            .find(namespace, Collection::Identities, &query)
            .await?;
        Ok(found.pop())
    }

    async fn require_policy(&self, reference: &PolicyRef) -> Result<()> {
        let policy: Option<Policy> = self
            .partitions
            .load(&reference.namespace, Collection::Policies, reference.uuid)
            .await?;
        if policy.is_none() {
            return Err(IamError::failed_precondition(format!(
                "policy {} does not exist",
                reference
            )));
        }
        Ok(())
    }

    fn keys_for(&self, identity: &Identity) -> Vec<String> {
        let mut keys = vec![identity_key(&identity.namespace, identity.uuid)];
        if let Some(login) = &identity.login {
            keys.push(identity_login_key(&identity.namespace, login));
        }
        keys
    }
}
