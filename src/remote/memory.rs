//! In-memory document store.
//!
//! Shared between coordinators by cloning; every clone sees the same
//! documents. Subscriptions are backed by one broadcast channel per watched
//! document.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};

use super::{DocumentChange, DocumentStore, Subscription, validate_name};
use crate::error::StoreError;

/// Buffered changes per watched document.
const WATCH_CAPACITY: usize = 32;

type DocKey = (String, String);

#[derive(Default)]
struct Inner {
    documents: HashMap<DocKey, Value>,
    watchers: HashMap<DocKey, broadcast::Sender<DocumentChange>>,
}

impl Inner {
    fn notify(&mut self, key: &DocKey, change: DocumentChange) {
        let stale = match self.watchers.get(key) {
            Some(tx) if tx.receiver_count() == 0 => true,
            Some(tx) => {
                let _ = tx.send(change);
                false
            }
            None => false,
        };
        if stale {
            self.watchers.remove(key);
        }
    }
}

/// Document store held entirely in process memory.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently stored in `collection`.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.inner
            .read()
            .await
            .documents
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }
}

fn key(collection: &str, id: &str) -> Result<DocKey, StoreError> {
    validate_name("collection", collection)?;
    validate_name("document", id)?;
    Ok((collection.to_string(), id.to_string()))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn write(&self, collection: &str, id: &str, document: Value) -> Result<(), StoreError> {
        let key = key(collection, id)?;
        let mut inner = self.inner.write().await;
        inner.documents.insert(key.clone(), document.clone());
        inner.notify(&key, DocumentChange::Written(document));
        Ok(())
    }

    async fn create(
        &self,
        collection: &str,
        id: &str,
        document: Value,
    ) -> Result<bool, StoreError> {
        let key = key(collection, id)?;
        let mut inner = self.inner.write().await;
        if inner.documents.contains_key(&key) {
            return Ok(false);
        }
        inner.documents.insert(key.clone(), document.clone());
        inner.notify(&key, DocumentChange::Written(document));
        Ok(true)
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let key = key(collection, id)?;
        Ok(self.inner.read().await.documents.get(&key).cloned())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let key = key(collection, id)?;
        let mut inner = self.inner.write().await;
        let removed = inner.documents.remove(&key).is_some();
        if removed {
            inner.notify(&key, DocumentChange::Deleted);
        }
        Ok(removed)
    }

    async fn subscribe(&self, collection: &str, id: &str) -> Result<Subscription, StoreError> {
        let key = key(collection, id)?;
        let mut inner = self.inner.write().await;
        let tx = inner
            .watchers
            .entry(key)
            .or_insert_with(|| broadcast::channel(WATCH_CAPACITY).0);
        Ok(Subscription::new(tx.subscribe()))
    }
}
