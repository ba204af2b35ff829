//! In-process collaborators
//!
//! - [`MemoryBackend`]: document store and namespace registry sharing one
//!   keyspace, so dropping a namespace removes every record in it at once
//! - [`MemoryCache`]: LRU-bounded cache with per-entry TTL
//! - [`MemoryCredentials`]: salted SHA-256 digests of identity secrets
//!
//! Suitable for tests, embedding and single-process deployments. Nothing is
//! durable.

use super::{
    Cache, Collection, CredentialVerifier, DocumentStore, NamespaceRegistry, Order, Query,
    StoreError, StoreResult,
};
use crate::core::directory::Identity;
use ahash::AHashMap;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use uuid::Uuid;

/// Stored record plus its insertion sequence number
#[derive(Debug, Clone)]
struct Record {
    seq: u64,
    doc: Value,
}

/// One namespace's worth of records
#[derive(Debug, Default)]
struct Partition {
    next_seq: u64,
    collections: AHashMap<Collection, AHashMap<Uuid, Record>>,
}

/// In-memory partitioned document store and namespace registry
///
/// The global namespace (`""`) always exists and cannot be dropped.
pub struct MemoryBackend {
    partitions: RwLock<AHashMap<String, Partition>>,
}

impl MemoryBackend {
    /// Create a backend holding only the global namespace
    pub fn new() -> Self {
        let mut partitions = AHashMap::new();
        partitions.insert(String::new(), Partition::default());
        MemoryBackend {
            partitions: RwLock::new(partitions),
        }
    }

    /// Provision a namespace; returns `false` if it already existed
    pub fn create_namespace(&self, name: &str) -> bool {
        let mut partitions = self.partitions.write();
        if partitions.contains_key(name) {
            return false;
        }
        partitions.insert(name.to_string(), Partition::default());
        debug!(namespace = name, "namespace partition created");
        true
    }

    /// Names of all live namespaces (unordered)
    pub fn namespaces(&self) -> Vec<String> {
        self.partitions.read().keys().cloned().collect()
    }

    /// Number of records in one collection of one namespace
    pub fn count(&self, namespace: &str, collection: Collection) -> usize {
        self.partitions
            .read()
            .get(namespace)
            .and_then(|p| p.collections.get(&collection))
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn insert(
        &self,
        namespace: &str,
        collection: Collection,
        id: Uuid,
        doc: Value,
    ) -> StoreResult<()> {
        let mut partitions = self.partitions.write();
        let partition = partitions
            .get_mut(namespace)
            .ok_or_else(|| StoreError::PartitionMissing(namespace.to_string()))?;

        let seq = partition.next_seq;
        let records = partition.collections.entry(collection).or_default();
        if records.contains_key(&id) {
            return Err(StoreError::Conflict(id));
        }
        records.insert(id, Record { seq, doc });
        partition.next_seq += 1;
        Ok(())
    }

    async fn get(
        &self,
        namespace: &str,
        collection: Collection,
        id: Uuid,
    ) -> StoreResult<Option<Value>> {
        let partitions = self.partitions.read();
        Ok(partitions
            .get(namespace)
            .and_then(|p| p.collections.get(&collection))
            .and_then(|c| c.get(&id))
            .map(|r| r.doc.clone()))
    }

    async fn replace(
        &self,
        namespace: &str,
        collection: Collection,
        id: Uuid,
        doc: Value,
    ) -> StoreResult<bool> {
        let mut partitions = self.partitions.write();
        let record = partitions
            .get_mut(namespace)
            .and_then(|p| p.collections.get_mut(&collection))
            .and_then(|c| c.get_mut(&id));

        match record {
            Some(record) => {
                record.doc = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, namespace: &str, collection: Collection, id: Uuid) -> StoreResult<bool> {
        let mut partitions = self.partitions.write();
        Ok(partitions
            .get_mut(namespace)
            .and_then(|p| p.collections.get_mut(&collection))
            .and_then(|c| c.remove(&id))
            .is_some())
    }

    async fn find(
        &self,
        namespace: &str,
        collection: Collection,
        query: &Query,
    ) -> StoreResult<Vec<Value>> {
        let partitions = self.partitions.read();
        let records = match partitions
            .get(namespace)
            .and_then(|p| p.collections.get(&collection))
        {
            Some(records) => records,
            None => return Ok(Vec::new()),
        };

        let mut matching: Vec<&Record> = records
            .values()
            .filter(|r| query.filters.iter().all(|f| f.matches(&r.doc)))
            .collect();

        match query.order {
            Order::Ascending => matching.sort_by_key(|r| r.seq),
            Order::Descending => matching.sort_by_key(|r| std::cmp::Reverse(r.seq)),
        }

        let limit = if query.limit == 0 {
            usize::MAX
        } else {
            query.limit
        };

        Ok(matching
            .into_iter()
            .skip(query.skip)
            .take(limit)
            .map(|r| r.doc.clone())
            .collect())
    }
}

#[async_trait]
impl NamespaceRegistry for MemoryBackend {
    async fn exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.partitions.read().contains_key(name))
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        if name.is_empty() {
            warn!("refusing to drop the global namespace");
            return Ok(());
        }
        if self.partitions.write().remove(name).is_some() {
            debug!(namespace = name, "namespace partition dropped");
        }
        Ok(())
    }
}

/// Cached value with its expiry deadline
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// LRU cache with per-entry TTL
///
/// Expired entries are dropped lazily on access.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        MemoryCache {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of entries currently held, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.live_value(key))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()> {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().put(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.lock().pop(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.live_value(key).is_some())
    }
}

/// In-memory credential store keyed by `(namespace, identity uuid)`
pub struct MemoryCredentials {
    digests: RwLock<AHashMap<(String, Uuid), [u8; 32]>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        MemoryCredentials {
            digests: RwLock::new(AHashMap::new()),
        }
    }

    /// Set or replace the secret for an identity
    pub fn set_secret(&self, namespace: &str, identity: Uuid, secret: &str) {
        let digest = Self::digest(identity, secret);
        self.digests
            .write()
            .insert((namespace.to_string(), identity), digest);
    }

    /// Forget an identity's secret; returns `true` if one was stored
    pub fn remove_secret(&self, namespace: &str, identity: Uuid) -> bool {
        self.digests
            .write()
            .remove(&(namespace.to_string(), identity))
            .is_some()
    }

    /// The identity uuid acts as the salt
    fn digest(identity: Uuid, secret: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(identity.as_bytes());
        hasher.update(secret.as_bytes());
        hasher.finalize().into()
    }
}

impl Default for MemoryCredentials {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialVerifier for MemoryCredentials {
    async fn verify(&self, identity: &Identity, namespace: &str, secret: &str) -> StoreResult<bool> {
        let stored = match self
            .digests
            .read()
            .get(&(namespace.to_string(), identity.uuid))
        {
            Some(digest) => *digest,
            None => return Ok(false),
        };

        let candidate = Self::digest(identity.uuid, secret);
        Ok(bool::from(stored.ct_eq(&candidate)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::FieldEq;
    use serde_json::json;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn test_insert_requires_partition() {
        let store = MemoryBackend::new();
        let id = Uuid::new_v4();

        let err = store
            .insert("missing", Collection::Policies, id, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PartitionMissing(_)));

        store.insert("", Collection::Policies, id, json!({})).await.unwrap();
        let dup = store
            .insert("", Collection::Policies, id, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(dup, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_partitions_are_isolated() {
        let store = MemoryBackend::new();
        store.create_namespace("a");
        store.create_namespace("b");
        let id = Uuid::new_v4();

        store
            .insert("a", Collection::Identities, id, json!({"n": 1}))
            .await
            .unwrap();

        assert!(store.get("a", Collection::Identities, id).await.unwrap().is_some());
        assert!(store.get("b", Collection::Identities, id).await.unwrap().is_none());
        assert!(store.get("a", Collection::Policies, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_drop_namespace_removes_everything() {
        let store = MemoryBackend::new();
        assert!(store.create_namespace("tenant"));
        assert!(!store.create_namespace("tenant"));

        let id = Uuid::new_v4();
        store
            .insert("tenant", Collection::Tokens, id, json!({}))
            .await
            .unwrap();

        NamespaceRegistry::delete(&store, "tenant").await.unwrap();

        assert!(!store.exists("tenant").await.unwrap());
        assert!(store.get("tenant", Collection::Tokens, id).await.unwrap().is_none());
        assert!(!store.remove("tenant", Collection::Tokens, id).await.unwrap());
        assert!(store
            .find("tenant", Collection::Tokens, &Query::all())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_global_namespace_is_permanent() {
        let store = MemoryBackend::new();
        NamespaceRegistry::delete(&store, "").await.unwrap();
        assert!(store.exists("").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_order_and_paging() {
        let store = MemoryBackend::new();
        for i in 0..5 {
            store
                .insert("", Collection::Tokens, Uuid::new_v4(), json!({"i": i, "even": i % 2 == 0}))
                .await
                .unwrap();
        }

        let asc = store
            .find("", Collection::Tokens, &Query::all())
            .await
            .unwrap();
        let order: Vec<i64> = asc.iter().map(|d| d["i"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);

        let desc = store
            .find(
                "",
                Collection::Tokens,
                &Query::all().ordered(Order::Descending).page(1, 2),
            )
            .await
            .unwrap();
        let order: Vec<i64> = desc.iter().map(|d| d["i"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![3, 2]);

        let evens = store
            .find(
                "",
                Collection::Tokens,
                &Query::all().with_filter(FieldEq::new("even", true)).page(1, 0),
            )
            .await
            .unwrap();
        let order: BTreeSet<i64> = evens.iter().map(|d| d["i"].as_i64().unwrap()).collect();
        assert_eq!(order, BTreeSet::from([2, 4]));
    }

    #[tokio::test]
    async fn test_replace_and_remove() {
        let store = MemoryBackend::new();
        let id = Uuid::new_v4();

        assert!(!store.replace("", Collection::Policies, id, json!({})).await.unwrap());

        store
            .insert("", Collection::Policies, id, json!({"v": 1}))
            .await
            .unwrap();
        assert!(store
            .replace("", Collection::Policies, id, json!({"v": 2}))
            .await
            .unwrap());
        assert_eq!(
            store.get("", Collection::Policies, id).await.unwrap().unwrap()["v"],
            2
        );

        assert!(store.remove("", Collection::Policies, id).await.unwrap());
        assert!(!store.remove("", Collection::Policies, id).await.unwrap());
        assert_eq!(store.count("", Collection::Policies), 0);
    }

    #[tokio::test]
    async fn test_cache_ttl_expiry() {
        let cache = MemoryCache::new(16);
        cache
            .set("k", "v".to_string(), Duration::from_millis(30))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(cache.exists("k").await.unwrap());

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cache.get("k").await.unwrap().is_none());
        assert!(!cache.exists("k").await.unwrap());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cache_delete_and_lru_eviction() {
        let cache = MemoryCache::new(2);
        let ttl = Duration::from_secs(60);

        cache.set("a", "1".into(), ttl).await.unwrap();
        cache.set("b", "2".into(), ttl).await.unwrap();
        cache.set("c", "3".into(), ttl).await.unwrap();

        assert!(cache.get("a").await.unwrap().is_none());
        assert_eq!(cache.len(), 2);

        cache.delete("b").await.unwrap();
        assert!(cache.get("b").await.unwrap().is_none());
        assert_eq!(cache.get("c").await.unwrap().as_deref(), Some("3"));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_credentials() {
        let creds = MemoryCredentials::new();
        let identity = Identity::new("tenant", "alice", None, true);

        assert!(!creds.verify(&identity, "tenant", "pw").await.unwrap());

        creds.set_secret("tenant", identity.uuid, "pw");
        assert!(creds.verify(&identity, "tenant", "pw").await.unwrap());
        assert!(!creds.verify(&identity, "tenant", "PW").await.unwrap());
        assert!(!creds.verify(&identity, "other", "pw").await.unwrap());

        assert!(creds.remove_secret("tenant", identity.uuid));
        assert!(!creds.verify(&identity, "tenant", "pw").await.unwrap());
    }
}
