//! Typed access to namespace partitions
//!
//! Wraps the document store and namespace registry so repositories deal in
//! entities instead of JSON. A missing partition and a missing record look the
//! same on every read path; only writes that need the partition to exist turn
//! its absence into `FailedPrecondition`.

use crate::core::error::{IamError, Result};
use crate::core::storage::{Collection, DocumentStore, NamespaceRegistry, Query, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct Partitions {
    store: Arc<dyn DocumentStore>,
    namespaces: Arc<dyn NamespaceRegistry>,
}

impl Partitions {
    pub(crate) fn new(store: Arc<dyn DocumentStore>, namespaces: Arc<dyn NamespaceRegistry>) -> Self {
        Partitions { store, namespaces }
    }

    pub(crate) async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespaces.exists(namespace).await?)
    }

    pub(crate) async fn require_namespace(&self, namespace: &str) -> Result<()> {
        if !self.namespace_exists(namespace).await? {
            return Err(IamError::failed_precondition(format!(
                "namespace '{}' does not exist",
                namespace
            )));
        }
        Ok(())
    }

    pub(crate) async fn load<T: DeserializeOwned>(
        &self,
        namespace: &str,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<T>> {
        match self.store.get(namespace, collection, id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn insert<T: Serialize>(
        &self,
        namespace: &str,
        collection: Collection,
        id: Uuid,
        entity: &T,
    ) -> Result<()> {
        let doc = serde_json::to_value(entity)?;
        match self.store.insert(namespace, collection, id, doc).await {
            Ok(()) => Ok(()),
            Err(StoreError::PartitionMissing(ns)) => Err(IamError::failed_precondition(format!(
                "namespace '{}' does not exist",
                ns
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn replace<T: Serialize>(
        &self,
        namespace: &str,
        collection: Collection,
        id: Uuid,
        entity: &T,
    ) -> Result<bool> {
        let doc = serde_json::to_value(entity)?;
        Ok(self.store.replace(namespace, collection, id, doc).await?)
    }

    pub(crate) async fn remove(&self, namespace: &str, collection: Collection, id: Uuid) -> Result<bool> {
        Ok(self.store.remove(namespace, collection, id).await?)
    }

    pub(crate) async fn find<T: DeserializeOwned>(
        &self,
        namespace: &str,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<T>> {
        self.store
            .find(namespace, collection, query)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(IamError::from))
            .collect()
    }

    pub(crate) async fn drop_namespace(&self, namespace: &str) -> Result<()> {
        Ok(self.namespaces.delete(namespace).await?)
    }
}
