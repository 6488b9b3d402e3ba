//! Shared remote document store.
//!
//! Two devices that have never talked to each other exchange pairing codes
//! and presence through this store. Documents are JSON values addressed by
//! `(collection, id)`.
//!
//! ```text
//! pairCodes/{code}            owner's live pairing code record
//! pairingNotices/{ownerId}    written by the redeemer for the code owner
//! users/{userId}              public presence, written only by its owner
//! ```

mod file;
mod memory;

use std::any::Any;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StoreError;

pub use file::FileDocumentStore;
pub use memory::MemoryDocumentStore;

/// Collection names used by the pairing protocol.
pub mod collections {
    pub const PAIR_CODES: &str = "pairCodes";
    pub const PAIRING_NOTICES: &str = "pairingNotices";
    pub const USERS: &str = "users";
}

/// A change observed on a subscribed document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentChange {
    /// The document now has this content.
    Written(Value),
    /// The document no longer exists.
    Deleted,
}

/// Live feed of changes to a single document.
///
/// Dropping the subscription cancels it.
pub struct Subscription {
    rx: broadcast::Receiver<DocumentChange>,
    /// Keeps backend resources (e.g. a file watcher) alive.
    _guard: Option<Box<dyn Any + Send>>,
}

impl Subscription {
    pub fn new(rx: broadcast::Receiver<DocumentChange>) -> Self {
        Self { rx, _guard: None }
    }

    /// Attach a value that must live exactly as long as the subscription.
    pub fn with_guard(mut self, guard: Box<dyn Any + Send>) -> Self {
        self._guard = Some(guard);
        self
    }

    /// Wait for the next change. Returns `None` once the feed has closed.
    ///
    /// Lagging only loses intermediate states, so it is logged and skipped.
    pub async fn next(&mut self) -> Option<DocumentChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Document subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("has_guard", &self._guard.is_some())
            .finish()
    }
}

/// Shared document store reachable by every device.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or replace a document.
    async fn write(&self, collection: &str, id: &str, document: Value) -> Result<(), StoreError>;

    /// Create a document only if none exists. Returns `false` if one did.
    async fn create(&self, collection: &str, id: &str, document: Value)
    -> Result<bool, StoreError>;

    /// Read a document.
    async fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Delete a document. Returns `true` only for the call that removed it,
    /// so concurrent deletes of one document have exactly one winner.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Subscribe to changes of one document.
    async fn subscribe(&self, collection: &str, id: &str) -> Result<Subscription, StoreError>;
}

/// Read and deserialize a document.
pub async fn read_document<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<T>, StoreError> {
    match store.read(collection, id).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and write a document.
pub async fn write_document<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    document: &T,
) -> Result<(), StoreError> {
    store
        .write(collection, id, serde_json::to_value(document)?)
        .await
}

/// Serialize and create a document if absent.
pub async fn create_document<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    document: &T,
) -> Result<bool, StoreError> {
    store
        .create(collection, id, serde_json::to_value(document)?)
        .await
}

/// Reject names that could escape a collection or document namespace.
pub(crate) fn validate_name(kind: &str, name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.starts_with('.')
        && !name.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(StoreError::Unavailable(format!(
            "invalid {} name: {:?}",
            kind, name
        )))
    }
}
