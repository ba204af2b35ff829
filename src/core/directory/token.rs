//! Token record repository
//!
//! Stores the persistent half of each issued artifact pair. Records are
//! immutable apart from the one-way `disabled` flag.

use super::cache::{token_key, CacheAside};
use super::partition::Partitions;
use super::{ActiveFilter, TokenData};
use crate::core::error::{IamError, Result};
use crate::core::storage::{Collection, FieldEq, Order, Query};
use crate::core::validation::{parse_uuid, validate_namespace};
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct TokenRepository {
    partitions: Partitions,
    cache: CacheAside,
}

impl TokenRepository {
    pub(crate) fn new(partitions: Partitions, cache: CacheAside) -> Self {
        TokenRepository { partitions, cache }
    }

    /// Persist a freshly minted record
    pub async fn insert(&self, token: &TokenData) -> Result<()> {
        validate_namespace(&token.namespace)?;
        self.partitions
            .insert(&token.namespace, Collection::Tokens, token.uuid, token)
            .await?;
        debug!(namespace = %token.namespace, uuid = %token.uuid, "token record stored");
        Ok(())
    }

    pub async fn get(&self, namespace: &str, uuid: &str, use_cache: bool) -> Result<TokenData> {
        let uuid = parse_uuid("token uuid", uuid)?;
        validate_namespace(namespace)?;

        self.lookup(namespace, uuid, use_cache).await?.ok_or_else(|| {
            IamError::not_found(format!("token {} in namespace '{}'", uuid, namespace))
        })
    }

    pub async fn lookup(&self, namespace: &str, uuid: Uuid, use_cache: bool) -> Result<Option<TokenData>> {
        let key = token_key(namespace, uuid);

        if use_cache {
            if let Some(token) = self.cache.fetch::<TokenData>(&key).await? {
                return Ok(Some(token));
            }
        }

        let token: Option<TokenData> = self
            .partitions
            .load(namespace, Collection::Tokens, uuid)
            .await?;

        if use_cache {
            if let Some(token) = &token {
                self.cache.fill(&key, token).await?;
            }
        }

        Ok(token)
    }

    /// Set the disabled flag; returns `true` only on the actual transition
    ///
    /// Missing and already-disabled records are no-ops.
    pub async fn disable(&self, namespace: &str, uuid: Uuid) -> Result<bool> {
        validate_namespace(namespace)?;

        let token: Option<TokenData> = self
            .partitions
            .load(namespace, Collection::Tokens, uuid)
            .await?;

        let transitioned = match token {
            Some(mut token) if !token.disabled => {
                token.disabled = true;
                self.partitions
                    .replace(namespace, Collection::Tokens, uuid, &token)
                    .await?
            }
            _ => false,
        };

        self.cache.invalidate(&[token_key(namespace, uuid)]).await?;

        if transitioned {
            info!(namespace, uuid = %uuid, "token disabled");
        }
        Ok(transitioned)
    }

    /// Remove a record; returns `false` if it was already gone
    pub async fn delete(&self, namespace: &str, uuid: Uuid) -> Result<bool> {
        validate_namespace(namespace)?;

        let removed = self
            .partitions
            .remove(namespace, Collection::Tokens, uuid)
            .await?;
        self.cache.invalidate(&[token_key(namespace, uuid)]).await?;

        if removed {
            info!(namespace, uuid = %uuid, "token deleted");
        }
        Ok(removed)
    }

    /// List records in creation order; `limit == 0` means unbounded
    pub async fn list(&self, namespace: &str, skip: usize, limit: usize) -> Result<Vec<TokenData>> {
        validate_namespace(namespace)?;
        self.partitions
            .find(namespace, Collection::Tokens, &Query::all().page(skip, limit))
            .await
    }

    /// Newest-first records issued to one identity
    ///
    /// The activity filter is applied before `skip`/`limit`.
    pub async fn list_for_identity(
        &self,
        namespace: &str,
        identity: Uuid,
        filter: ActiveFilter,
        now: DateTime<Utc>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<TokenData>> {
        validate_namespace(namespace)?;

        let query = Query::all()
            .with_filter(FieldEq::new("identity", identity.to_string()))
            .ordered(Order::Descending);

        let tokens: Vec<TokenData> = self
            .partitions
            .find(namespace, Collection::Tokens, &query)
            .await?;

        let limit = if limit == 0 { usize::MAX } else { limit };

        Ok(tokens
            .into_iter()
            .filter(|token| filter.admits(token, now))
            .skip(skip)
            .take(limit)
            .collect())
    }
}
