//! Policy repository

use super::cache::{policy_key, CacheAside};
use super::partition::Partitions;
use super::{NewPolicy, Policy, PolicyPatch};
use crate::core::error::{IamError, Result};
use crate::core::storage::{Collection, Query};
use crate::core::validation::{parse_uuid, validate_name, validate_namespace, validate_patterns};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct PolicyRepository {
    partitions: Partitions,
    cache: CacheAside,
}

impl PolicyRepository {
    pub(crate) fn new(partitions: Partitions, cache: CacheAside) -> Self {
        PolicyRepository { partitions, cache }
    }

    /// Create a policy in an existing namespace
    pub async fn create(&self, namespace: &str, new: NewPolicy) -> Result<Policy> {
        validate_namespace(namespace)?;
        validate_name("name", &new.name)?;
        validate_patterns("resources", &new.resources)?;
        validate_patterns("actions", &new.actions)?;

        self.partitions.require_namespace(namespace).await?;

        let policy = Policy {
            namespace: namespace.to_string(),
            uuid: Uuid::new_v4(),
            name: new.name,
            resources: new.resources,
            actions: new.actions,
            created_at: Utc::now(),
        };

        self.partitions
            .insert(namespace, Collection::Policies, policy.uuid, &policy)
            .await?;

        info!(namespace, uuid = %policy.uuid, name = %policy.name, "policy created");
        Ok(policy)
    }

    pub async fn get(&self, namespace: &str, uuid: &str, use_cache: bool) -> Result<Policy> {
        let uuid = parse_uuid("policy uuid", uuid)?;
        validate_namespace(namespace)?;

        self.lookup(namespace, uuid, use_cache).await?.ok_or_else(|| {
            IamError::not_found(format!("policy {} in namespace '{}'", uuid, namespace))
        })
    }

    pub async fn lookup(&self, namespace: &str, uuid: Uuid, use_cache: bool) -> Result<Option<Policy>> {
        let key = policy_key(namespace, uuid);

        if use_cache {
            if let Some(policy) = self.cache.fetch::<Policy>(&key).await? {
                return Ok(Some(policy));
            }
        }

        let policy: Option<Policy> = self
            .partitions
            .load(namespace, Collection::Policies, uuid)
            .await?;

        if use_cache {
            if let Some(policy) = &policy {
                self.cache.fill(&key, policy).await?;
            }
        }

        Ok(policy)
    }

    /// Replace a policy's name and/or patterns; the namespace never changes
    pub async fn update(&self, namespace: &str, uuid: &str, patch: PolicyPatch) -> Result<Policy> {
        let uuid = parse_uuid("policy uuid", uuid)?;
        validate_namespace(namespace)?;
        if let Some(name) = &patch.name {
            validate_name("name", name)?;
        }
        if let Some(resources) = &patch.resources {
            validate_patterns("resources", resources)?;
        }
        if let Some(actions) = &patch.actions {
            validate_patterns("actions", actions)?;
        }

        let mut policy: Policy = self
            .partitions
            .load(namespace, Collection::Policies, uuid)
            .await?
            .ok_or_else(|| {
                IamError::not_found(format!("policy {} in namespace '{}'", uuid, namespace))
            })?;

        if let Some(name) = patch.name {
            policy.name = name;
        }
        if let Some(resources) = patch.resources {
            policy.resources = resources;
        }
        if let Some(actions) = patch.actions {
            policy.actions = actions;
        }

        let replaced = self
            .partitions
            .replace(namespace, Collection::Policies, uuid, &policy)
            .await?;
        if !replaced {
            return Err(IamError::not_found(format!(
                "policy {} in namespace '{}'",
                uuid, namespace
            )));
        }
        self.cache.invalidate(&[policy_key(namespace, uuid)]).await?;

        debug!(namespace, uuid = %uuid, "policy updated");
        Ok(policy)
    }

    /// Delete a policy; a missing policy is a no-op
    ///
    /// Identities still referencing it keep the reference; it is skipped when
    /// their policies are flattened.
    pub async fn delete(&self, namespace: &str, uuid: &str) -> Result<()> {
        let uuid = parse_uuid("policy uuid", uuid)?;
        validate_namespace(namespace)?;

        let removed = self
            .partitions
            .remove(namespace, Collection::Policies, uuid)
            .await?;
        self.cache.invalidate(&[policy_key(namespace, uuid)]).await?;

        if removed {
            info!(namespace, uuid = %uuid, "policy deleted");
        }
        Ok(())
    }

    /// List policies in creation order; `limit == 0` means unbounded
    pub async fn list(&self, namespace: &str, skip: usize, limit: usize) -> Result<Vec<Policy>> {
        validate_namespace(namespace)?;
        self.partitions
            .find(namespace, Collection::Policies, &Query::all().page(skip, limit))
            .await
    }
}
