//! External collaborators of the engine
//!
//! The engine never talks to a database, cache or credential backend directly.
//! It goes through four narrow async traits:
//! - [`DocumentStore`]: namespace-partitioned document CRUD with equality
//!   lookups and offset/limit listing, atomic per record
//! - [`NamespaceRegistry`]: existence checks and atomic partition teardown
//! - [`Cache`]: opaque string key/value with TTL
//! - [`CredentialVerifier`]: a boolean oracle for identity secrets
//!
//! [`memory`] provides in-process implementations of all four.

pub mod memory;

use crate::core::directory::Identity;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub use memory::{MemoryBackend, MemoryCache, MemoryCredentials};

/// Failure reported by a collaborator
#[derive(Error, Debug)]
pub enum StoreError {
    /// The target namespace partition does not exist
    #[error("Namespace partition does not exist: '{0}'")]
    PartitionMissing(String),

    /// A record with this id already exists in the partition
    #[error("Record already exists: {0}")]
    Conflict(Uuid),

    /// The backend itself failed
    #[error("Backend failure: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Entity kind stored in a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Identities,
    Policies,
    Tokens,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Identities => "identities",
            Collection::Policies => "policies",
            Collection::Tokens => "tokens",
        }
    }
}

/// Listing order (by insertion)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Oldest first
    #[default]
    Ascending,
    /// Newest first
    Descending,
}

/// Equality filter on a top-level document field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEq {
    pub field: String,
    pub value: Value,
}

impl FieldEq {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FieldEq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        doc.get(&self.field) == Some(&self.value)
    }
}

/// Query over one partition: conjunction of equality filters, then order,
/// then `skip`, then `limit` (`0` means unbounded)
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<FieldEq>,
    pub order: Order,
    pub skip: usize,
    pub limit: usize,
}

impl Query {
    pub fn all() -> Self {
        Query::default()
    }

    pub fn with_filter(mut self, filter: FieldEq) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn ordered(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn page(mut self, skip: usize, limit: usize) -> Self {
        self.skip = skip;
        self.limit = limit;
        self
    }
}

/// Namespace-partitioned document store
///
/// Reads inside a missing partition behave exactly like reads of a missing
/// record (`None`, empty list, `false`). Only inserts distinguish the two.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new record; fails with `PartitionMissing` or `Conflict`
    async fn insert(
        &self,
        namespace: &str,
        collection: Collection,
        id: Uuid,
        doc: Value,
    ) -> StoreResult<()>;

    async fn get(&self, namespace: &str, collection: Collection, id: Uuid)
        -> StoreResult<Option<Value>>;

    /// Replace an existing record; `false` if there was nothing to replace
    async fn replace(
        &self,
        namespace: &str,
        collection: Collection,
        id: Uuid,
        doc: Value,
    ) -> StoreResult<bool>;

    /// Remove a record; `false` if it was already absent
    async fn remove(&self, namespace: &str, collection: Collection, id: Uuid)
        -> StoreResult<bool>;

    async fn find(
        &self,
        namespace: &str,
        collection: Collection,
        query: &Query,
    ) -> StoreResult<Vec<Value>>;
}

/// Namespace lifecycle collaborator
#[async_trait]
pub trait NamespaceRegistry: Send + Sync {
    async fn exists(&self, name: &str) -> StoreResult<bool>;

    /// Drop the whole partition atomically (no-op if absent)
    async fn delete(&self, name: &str) -> StoreResult<()>;
}

/// String key/value cache with per-entry TTL
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;
}

/// Credential oracle
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, identity: &Identity, namespace: &str, secret: &str)
        -> StoreResult<bool>;
}
