//! Cache-aside helper shared by the repositories
//!
//! Reads: live entry wins, otherwise the caller loads from the partition and
//! fills. Writes: the caller mutates the partition first, then deletes every
//! key mirroring the entity. There is no reconciliation; an entry that
//! survives a crash between the two steps dies with its TTL.

use crate::core::error::Result;
use crate::core::storage::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

pub(crate) fn identity_key(namespace: &str, uuid: Uuid) -> String {
    format!("identity:{}:{}", namespace, uuid)
}

pub(crate) fn identity_login_key(namespace: &str, login: &str) -> String {
    format!("identity-login:{}:{}", namespace, login)
}

pub(crate) fn policy_key(namespace: &str, uuid: Uuid) -> String {
    format!("policy:{}:{}", namespace, uuid)
}

pub(crate) fn token_key(namespace: &str, uuid: Uuid) -> String {
    format!("token:{}:{}", namespace, uuid)
}

#[derive(Clone)]
pub(crate) struct CacheAside {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl CacheAside {
    pub(crate) fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        CacheAside { cache, ttl }
    }

    /// Read a live entry; an undecodable entry is dropped and treated as a miss
    pub(crate) async fn fetch<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw = match self.cache.get(key).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "dropping undecodable cache entry");
                self.cache.delete(key).await?;
                Ok(None)
            }
        }
    }

    pub(crate) async fn fill<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.cache.set(key, raw, self.ttl).await?;
        Ok(())
    }

    pub(crate) async fn invalidate(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.cache.delete(key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::MemoryCache;

    #[test]
    fn test_keys_are_namespaced() {
        let id = Uuid::nil();
        assert_eq!(
            identity_key("", id),
            "identity::00000000-0000-0000-0000-000000000000"
        );
        assert_ne!(identity_key("a", id), identity_key("b", id));
        assert_ne!(identity_key("a", id), policy_key("a", id));
        assert_ne!(policy_key("a", id), token_key("a", id));
        assert_eq!(identity_login_key("t", "bob"), "identity-login:t:bob");
    }

    #[tokio::test]
    async fn test_fill_fetch_invalidate() {
        let cache = Arc::new(MemoryCache::new(8));
        let aside = CacheAside::new(cache.clone(), Duration::from_secs(30));

        assert!(aside.fetch::<Vec<u32>>("k").await.unwrap().is_none());

        aside.fill("k", &vec![1u32, 2, 3]).await.unwrap();
        assert_eq!(aside.fetch::<Vec<u32>>("k").await.unwrap(), Some(vec![1, 2, 3]));

        aside.invalidate(&["k".to_string()]).await.unwrap();
        assert!(aside.fetch::<Vec<u32>>("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let cache = Arc::new(MemoryCache::new(8));
        let aside = CacheAside::new(cache.clone(), Duration::from_secs(30));

        cache
            .set("k", "not json".to_string(), Duration::from_secs(30))
            .await
            .unwrap();

        assert!(aside.fetch::<Vec<u32>>("k").await.unwrap().is_none());
        assert!(cache.is_empty());
    }
}
