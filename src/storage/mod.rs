//! Key-value persistence shared by the engine and its viewers.
//!
//! Writers replace whole values; every write is published to subscribers
//! as a [`StorageChange`], which is how passive readers follow a run live.
//!
//! ## Keys
//!
//! ```text
//! aggregatedData   # AggregatedSnapshot
//! status           # RunStatus
//! logs             # [LogEntry], newest last, bounded
//! ```

pub mod local;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{AppError, Result};
use crate::models::{AggregatedSnapshot, RunStatus};

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Key of the aggregated snapshot.
pub const AGGREGATED_DATA: &str = "aggregatedData";
/// Key of the current run status.
pub const STATUS: &str = "status";
/// Key of the event log.
pub const LOGS: &str = "logs";

/// Capacity of the change notification channel.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A value replaced in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Trait for key-value storage backends.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read several keys at once. Missing keys are absent from the map.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;

    /// Write several keys at once.
    async fn set(&self, entries: HashMap<String, Value>) -> Result<()>;

    /// Receive a [`StorageChange`] for every key written from now on.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

fn change_channel() -> broadcast::Sender<StorageChange> {
    broadcast::channel(CHANGE_CHANNEL_CAPACITY).0
}

/// Keys become file names, so keep them to a safe alphabet.
fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::storage(format!("invalid key: {key:?}")))
    }
}

/// Read a single key.
pub async fn get_one(store: &dyn KeyValueStore, key: &str) -> Result<Option<Value>> {
    Ok(store.get(&[key]).await?.remove(key))
}

/// Write a single key.
pub async fn set_one(store: &dyn KeyValueStore, key: &str, value: Value) -> Result<()> {
    store.set(HashMap::from([(key.to_string(), value)])).await
}

/// Load the stored snapshot, or an empty one if nothing was stored yet.
pub async fn load_snapshot(store: &dyn KeyValueStore) -> Result<AggregatedSnapshot> {
    match get_one(store, AGGREGATED_DATA).await? {
        Some(value) => AggregatedSnapshot::from_value(value),
        None => Ok(AggregatedSnapshot::empty()),
    }
}

/// Replace the stored snapshot.
pub async fn save_snapshot(store: &dyn KeyValueStore, snapshot: &AggregatedSnapshot) -> Result<()> {
    set_one(store, AGGREGATED_DATA, snapshot.to_value()?).await
}

/// Load the status cell, defaulting to idle.
pub async fn load_status(store: &dyn KeyValueStore) -> Result<RunStatus> {
    match get_one(store, STATUS).await? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(RunStatus::default()),
    }
}
