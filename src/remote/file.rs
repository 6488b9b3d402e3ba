//! Shared-directory document store.
//!
//! Lets several processes on one machine (or on a synced folder) act as
//! separate devices. Layout: `<root>/<collection>/<id>.json`.
//!
//! - `write` writes a temp file and renames it over the target.
//! - `create` hard-links a temp file to the target, which fails atomically
//!   if the target exists.
//! - `delete` unlinks the target; only one unlink of a file can succeed.
//! - `subscribe` watches the collection directory with `notify` and re-reads
//!   the document on every event touching it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use notify::{Event, RecursiveMode, Watcher};
use serde_json::Value;
use tokio::sync::broadcast;

use super::{DocumentChange, DocumentStore, Subscription, validate_name};
use crate::error::StoreError;

const WATCH_CAPACITY: usize = 32;

/// Document store laid out as JSON files under a shared root directory.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    root: PathBuf,
}

impl FileDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf, StoreError> {
        validate_name("collection", collection)?;
        Ok(self.root.join(collection))
    }

    fn document_path(&self, collection: &str, id: &str) -> Result<PathBuf, StoreError> {
        validate_name("document", id)?;
        Ok(self.collection_dir(collection)?.join(format!("{}.json", id)))
    }

    async fn write_temp(&self, dir: &Path, document: &Value) -> Result<PathBuf, StoreError> {
        tokio::fs::create_dir_all(dir).await?;
        let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(document)?).await?;
        Ok(tmp)
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn write(&self, collection: &str, id: &str, document: Value) -> Result<(), StoreError> {
        let path = self.document_path(collection, id)?;
        let dir = self.collection_dir(collection)?;
        let tmp = self.write_temp(&dir, &document).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn create(
        &self,
        collection: &str,
        id: &str,
        document: Value,
    ) -> Result<bool, StoreError> {
        let path = self.document_path(collection, id)?;
        let dir = self.collection_dir(collection)?;
        let tmp = self.write_temp(&dir, &document).await?;
        let linked = tokio::fs::hard_link(&tmp, &path).await;
        let _ = tokio::fs::remove_file(&tmp).await;
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let path = self.document_path(collection, id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let path = self.document_path(collection, id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn subscribe(&self, collection: &str, id: &str) -> Result<Subscription, StoreError> {
        let path = self.document_path(collection, id)?;
        let dir = self.collection_dir(collection)?;
        tokio::fs::create_dir_all(&dir).await?;

        let watch_error = |reason: String| StoreError::Watch {
            collection: collection.to_string(),
            id: id.to_string(),
            reason,
        };

        let (tx, rx) = broadcast::channel(WATCH_CAPACITY);
        let file_name: OsString = format!("{}.json", id).into();
        let target = path.clone();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let Ok(event) = res else {
                return;
            };
            let touches_target = event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(file_name.as_os_str()));
            if !touches_target {
                return;
            }
            let change = match std::fs::read(&target) {
                Ok(bytes) => match serde_json::from_slice(&bytes) {
                    Ok(value) => DocumentChange::Written(value),
                    Err(_) => return,
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => DocumentChange::Deleted,
                Err(_) => return,
            };
            let _ = tx.send(change);
        })
        .map_err(|e| watch_error(e.to_string()))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| watch_error(e.to_string()))?;

        tracing::debug!(path = %path.display(), "Watching shared document");
        Ok(Subscription::new(rx).with_guard(Box::new(watcher)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(dir.path());
        store
            .write("users", "a", json!({"isOnline": true}))
            .await
            .unwrap();
        assert_eq!(
            store.read("users", "a").await.unwrap(),
            Some(json!({"isOnline": true}))
        );
        assert!(dir.path().join("users").join("a.json").exists());
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(dir.path());
        assert!(store.read("pairCodes", "123456").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_only_once() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(dir.path());
        assert!(store.create("pairCodes", "123456", json!(1)).await.unwrap());
        assert!(!store.create("pairCodes", "123456", json!(2)).await.unwrap());
        assert_eq!(
            store.read("pairCodes", "123456").await.unwrap(),
            Some(json!(1))
        );
    }

    #[tokio::test]
    async fn test_second_delete_reports_false() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(dir.path());
        store.write("pairCodes", "123456", json!({})).await.unwrap();
        assert!(store.delete("pairCodes", "123456").await.unwrap());
        assert!(!store.delete("pairCodes", "123456").await.unwrap());
    }

    #[tokio::test]
    async fn test_no_temp_files_after_create() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(dir.path());
        store.create("pairCodes", "654321", json!({})).await.unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path().join("pairCodes"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["654321.json".to_string()]);
    }

    #[tokio::test]
    async fn test_subscription_observes_external_write() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(dir.path());
        let mut sub = store.subscribe("users", "partner").await.unwrap();

        let writer = FileDocumentStore::new(dir.path());
        writer
            .write("users", "partner", json!({"isOnline": true}))
            .await
            .unwrap();

        let change = tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .expect("watcher should report the write");
        assert_eq!(
            change,
            Some(DocumentChange::Written(json!({"isOnline": true})))
        );
    }

    #[tokio::test]
    async fn test_invalid_document_id_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(dir.path());
        assert!(store.write("users", "../escape", json!({})).await.is_err());
    }
}
