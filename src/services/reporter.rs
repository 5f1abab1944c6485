// src/services/reporter.rs

//! Status and event-log reporting.
//!
//! Every event goes to the process log through `log` and is appended to the
//! bounded `logs` list in the store, where viewers pick it up. A failed
//! write never interrupts the caller.
//!
//! Appending is a read-modify-write of that list. Clones of a reporter share
//! one lock, so every writer in a process should log through clones of the
//! same reporter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::RunStatus;
use crate::storage::{self, KeyValueStore, LOGS, STATUS};

/// Severity of a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventLevel {
    Info,
    Success,
    Warn,
    Error,
}

/// One entry of the persisted event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: EventLevel,
    pub event: String,
    #[serde(default)]
    pub context: Value,
}

/// Writes status updates and log events to a [`KeyValueStore`].
#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<dyn KeyValueStore>,
    max_entries: usize,
    log_lock: Arc<Mutex<()>>,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn KeyValueStore>, max_entries: usize) -> Self {
        Self {
            store,
            max_entries: max_entries.max(1),
            log_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Record an event.
    pub async fn log(&self, level: EventLevel, event: &str, context: Value) {
        match level {
            EventLevel::Info | EventLevel::Success => log::info!("{} {}", event, context),
            EventLevel::Warn => log::warn!("{} {}", event, context),
            EventLevel::Error => log::error!("{} {}", event, context),
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            event: event.to_string(),
            context,
        };
        if let Err(e) = self.append(entry).await {
            log::error!("Failed to write to log storage: {}", e);
        }
    }

    pub async fn info(&self, event: &str, context: Value) {
        self.log(EventLevel::Info, event, context).await
    }

    pub async fn success(&self, event: &str, context: Value) {
        self.log(EventLevel::Success, event, context).await
    }

    pub async fn warn(&self, event: &str, context: Value) {
        self.log(EventLevel::Warn, event, context).await
    }

    pub async fn error(&self, event: &str, context: Value) {
        self.log(EventLevel::Error, event, context).await
    }

    /// Replace the status cell, then log the change.
    pub async fn set_status(&self, status: RunStatus) {
        let value = json!({ "status": status.name, "message": status.message });
        match serde_json::to_value(&status) {
            Ok(encoded) => {
                if let Err(e) = storage::set_one(self.store.as_ref(), STATUS, encoded).await {
                    log::error!("Failed to write status: {}", e);
                }
            }
            Err(e) => log::error!("Failed to encode status: {}", e),
        }
        self.info("SET_STATUS", value).await;
    }

    /// Stored entries, oldest first. Entries that do not decode are skipped.
    pub async fn entries(&self) -> Result<Vec<LogEntry>> {
        load_logs(self.store.as_ref()).await
    }

    /// Remove every stored entry.
    pub async fn clear(&self) -> Result<()> {
        let _held = self.log_lock.lock().await;
        storage::set_one(self.store.as_ref(), LOGS, Value::Array(Vec::new())).await
    }

    async fn append(&self, entry: LogEntry) -> Result<()> {
        let _held = self.log_lock.lock().await;
        let mut entries = self.entries().await?;
        entries.push(entry);
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }
        storage::set_one(self.store.as_ref(), LOGS, serde_json::to_value(entries)?).await
    }
}

/// Read the event log from `store`, oldest first.
pub async fn load_logs(store: &dyn KeyValueStore) -> Result<Vec<LogEntry>> {
    let entries = match storage::get_one(store, LOGS).await? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    };
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatusName;
    use crate::storage::{MemoryStorage, load_status};

    fn reporter(max_entries: usize) -> (Arc<MemoryStorage>, StatusReporter) {
        let store = Arc::new(MemoryStorage::new());
        let reporter = StatusReporter::new(store.clone(), max_entries);
        (store, reporter)
    }

    #[tokio::test]
    async fn test_log_appends_entries() {
        let (_, reporter) = reporter(10);
        reporter.info("PROCESSING_COURSE", json!({"courseName": "Math"})).await;
        reporter.warn("RETURN_TO_COURSE_FAILED", json!({})).await;

        let entries = reporter.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, "PROCESSING_COURSE");
        assert_eq!(entries[0].context["courseName"], "Math");
        assert_eq!(entries[1].level, EventLevel::Warn);
    }

    #[tokio::test]
    async fn test_log_is_bounded_keeping_newest() {
        let (_, reporter) = reporter(3);
        for i in 0..5 {
            reporter.info(&format!("E{i}"), Value::Null).await;
        }
        let events: Vec<_> = reporter
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert_eq!(events, vec!["E2", "E3", "E4"]);
    }

    #[tokio::test]
    async fn test_set_status_writes_cell_and_logs() {
        let (store, reporter) = reporter(10);
        reporter.set_status(RunStatus::running("Processing course: Math")).await;

        let status = load_status(store.as_ref()).await.unwrap();
        assert_eq!(status.name, StatusName::Running);
        assert_eq!(status.message, "Processing course: Math");

        let entries = reporter.entries().await.unwrap();
        assert_eq!(entries[0].event, "SET_STATUS");
        assert_eq!(entries[0].context["status"], "running");
    }

    #[tokio::test]
    async fn test_level_serializes_upper_case() {
        let (store, reporter) = reporter(10);
        reporter.success("AGGREGATION_COMPLETE", json!({})).await;
        let raw = storage::get_one(store.as_ref(), LOGS).await.unwrap().unwrap();
        assert_eq!(raw[0]["level"], "SUCCESS");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_clones_keep_every_entry() {
        let (_, reporter) = reporter(100);
        let mut tasks = Vec::new();
        for writer in 0..4 {
            let reporter = reporter.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..10 {
                    reporter.info(&format!("W{writer}-{i}"), Value::Null).await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let entries = reporter.entries().await.unwrap();
        assert_eq!(entries.len(), 40);
        for writer in 0..4 {
            let own: Vec<_> = entries
                .iter()
                .filter(|e| e.event.starts_with(&format!("W{writer}-")))
                .map(|e| e.event.clone())
                .collect();
            let expected: Vec<_> = (0..10).map(|i| format!("W{writer}-{i}")).collect();
            assert_eq!(own, expected);
        }
    }

    #[tokio::test]
    async fn test_clear_and_garbage_tolerance() {
        let (store, reporter) = reporter(10);
        storage::set_one(store.as_ref(), LOGS, json!("garbage")).await.unwrap();
        assert!(reporter.entries().await.unwrap().is_empty());

        reporter.info("X", Value::Null).await;
        reporter.clear().await.unwrap();
        assert!(load_logs(store.as_ref()).await.unwrap().is_empty());
    }
}
