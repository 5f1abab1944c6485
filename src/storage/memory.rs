//! In-memory storage, for tests and throwaway sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{AppError, Result};
use crate::storage::{KeyValueStore, StorageChange, change_channel, validate_key};

pub struct MemoryStorage {
    values: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            changes: change_channel(),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let values = self
            .values
            .lock()
            .map_err(|_| AppError::storage("memory store poisoned"))?;
        let mut found = HashMap::new();
        for key in keys {
            validate_key(key)?;
            if let Some(value) = values.get(*key) {
                found.insert(key.to_string(), value.clone());
            }
        }
        Ok(found)
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<()> {
        for key in entries.keys() {
            validate_key(key)?;
        }
        let mut values = self
            .values
            .lock()
            .map_err(|_| AppError::storage("memory store poisoned"))?;
        for (key, value) in entries {
            let old_value = values.insert(key.clone(), value.clone());
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
    use crate::models::AggregatedSnapshot;
    use crate::storage::{load_snapshot, save_snapshot};

    #[tokio::test]
    async fn test_snapshot_defaults_to_empty() {
        let storage = MemoryStorage::new();
        let snapshot = load_snapshot(&storage).await.unwrap();
        assert_eq!(snapshot, AggregatedSnapshot::empty());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_notifies() {
        let storage = MemoryStorage::new();
        let mut changes = storage.subscribe();

        let mut snapshot = AggregatedSnapshot::empty();
        snapshot.courses.push("Math101".to_string());
        save_snapshot(&storage, &snapshot).await.unwrap();

        assert_eq!(load_snapshot(&storage).await.unwrap(), snapshot);
        let change = changes.recv().await.unwrap();
        assert_eq!(change.key, crate::storage::AGGREGATED_DATA);
        assert!(change.old_value.is_none());
    }
}
