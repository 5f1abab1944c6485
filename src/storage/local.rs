//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml           # Aggregator configuration
//! ├── aggregatedData.json   # Snapshot
//! ├── status.json           # Current run status
//! └── logs.json             # Event log
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, broadcast};

use crate::error::{AppError, Result};
use crate::storage::{KeyValueStore, StorageChange, change_channel, validate_key};

/// Local filesystem storage backend, one JSON file per key.
pub struct LocalStorage {
    root_dir: PathBuf,
    changes: broadcast::Sender<StorageChange>,
    /// Serializes read-old/write-new so change events are accurate
    write_lock: Mutex<()>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            changes: change_channel(),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the full path for a key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(format!("{key}.json"))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Read a JSON value, returning None if the file doesn't exist.
    async fn read_json(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl KeyValueStore for LocalStorage {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let mut found = HashMap::new();
        for key in keys {
            validate_key(key)?;
            if let Some(value) = self.read_json(key).await? {
                found.insert(key.to_string(), value);
            }
        }
        Ok(found)
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<()> {
        for key in entries.keys() {
            validate_key(key)?;
        }

        let _guard = self.write_lock.lock().await;
        for (key, value) in entries {
            // An unreadable old file must not block replacing it.
            let old_value = self.read_json(&key).await.unwrap_or_else(|e| {
                log::warn!("Discarding unreadable value for {}: {}", key, e);
                None
            });
            let bytes = serde_json::to_vec_pretty(&value)?;
            self.write_bytes(&self.path(&key), &bytes).await?;
            log::debug!("Stored {} ({} bytes)", key, bytes.len());

            let _ = self.changes.send(StorageChange {
                key,
                old_value,
                new_value: Some(value),
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{get_one, set_one};
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        set_one(&storage, "status", json!({"name": "idle"}))
            .await
            .unwrap();
        let value = get_one(&storage, "status").await.unwrap();
        assert_eq!(value, Some(json!({"name": "idle"})));
        assert!(tmp.path().join("status.json").exists());
        assert!(!tmp.path().join("status.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let found = storage.get(&["nope", "status"]).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_change_notification_carries_old_value() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let mut changes = storage.subscribe();

        set_one(&storage, "logs", json!([1])).await.unwrap();
        set_one(&storage, "logs", json!([1, 2])).await.unwrap();

        let first = changes.recv().await.unwrap();
        assert_eq!(first.old_value, None);
        let second = changes.recv().await.unwrap();
        assert_eq!(second.key, "logs");
        assert_eq!(second.old_value, Some(json!([1])));
        assert_eq!(second.new_value, Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(set_one(&storage, "../x", json!(1)).await.is_err());
        assert!(storage.get(&["a/b"]).await.is_err());
    }
}
