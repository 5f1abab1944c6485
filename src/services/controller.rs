// src/services/controller.rs

//! Command handling for the aggregator.
//!
//! Accepts `START_AGGREGATION` and `CLEAR_DATA`. A started run proceeds in
//! the background; the command is answered as soon as it is accepted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::models::{AggregatedSnapshot, PortalConfig, RunStatus};
use crate::pipeline::AggregationEngine;
use crate::services::reporter::StatusReporter;
use crate::storage::{self, KeyValueStore};

/// A command sent to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    StartAggregation,
    ClearData,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::StartAggregation => "START_AGGREGATION",
            Command::ClearData => "CLEAR_DATA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Immediate answer to a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: ResponseStatus,
    pub message: String,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Ok,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}

/// Clears the running flag when the run ends, however it ends.
struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Dispatches commands to the engine and the store.
pub struct Controller {
    engine: Arc<AggregationEngine>,
    store: Arc<dyn KeyValueStore>,
    reporter: StatusReporter,
    portal: PortalConfig,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Controller {
    /// Events are logged through the engine's reporter, so both sides
    /// append to the one log without losing entries.
    pub fn new(
        engine: Arc<AggregationEngine>,
        store: Arc<dyn KeyValueStore>,
        portal: PortalConfig,
    ) -> Self {
        Self {
            reporter: engine.reporter().clone(),
            engine,
            store,
            portal,
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Handle one command.
    pub async fn handle(&self, command: Command) -> Response {
        self.reporter
            .info("MESSAGE_RECEIVED", json!({ "type": command.name() }))
            .await;
        match command {
            Command::StartAggregation => self.start_aggregation().await,
            Command::ClearData => self.clear_data().await,
        }
    }

    async fn start_aggregation(&self) -> Response {
        let Some(guard) = RunGuard::acquire(&self.running) else {
            self.reporter
                .warn("RUN_REJECTED_ALREADY_RUNNING", json!({}))
                .await;
            return Response::error(AppError::AlreadyRunning.to_string());
        };

        let url = match self.engine.current_url().await {
            Ok(url) => url,
            Err(e) => return Response::error(e.to_string()),
        };
        if !self.portal.is_portal_page(&url) {
            self.reporter
                .error("NOT_ON_PORTAL_PAGE", json!({ "url": url }))
                .await;
            self.reporter
                .set_status(RunStatus::error(format!(
                    "Please open {} before syncing",
                    self.portal.base_url
                )))
                .await;
            return Response::error(AppError::NotOnPortal { url }.to_string());
        }

        let engine = Arc::clone(&self.engine);
        let handle = tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = engine.run().await {
                log::error!("Aggregation run failed: {}", e);
            }
        });
        *self.task.lock().await = Some(handle);

        Response::ok("Aggregation process started.")
    }

    async fn clear_data(&self) -> Response {
        if self.is_running() {
            return Response::error("Cannot clear data while a sync is running");
        }

        match storage::save_snapshot(self.store.as_ref(), &AggregatedSnapshot::empty()).await {
            Ok(()) => {
                self.reporter.info("LOCAL_DATA_CLEARED", json!({})).await;
                self.reporter
                    .set_status(RunStatus::idle("Data cleared. Ready to sync."))
                    .await;
                Response::ok("Data cleared.")
            }
            Err(e) => {
                self.reporter
                    .error("CLEAR_DATA_FAILED", json!({ "error": e.to_string() }))
                    .await;
                Response::error(e.to_string())
            }
        }
    }

    /// Wait for the background run, if any, to finish.
    pub async fn wait_idle(&self) {
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::error!("Aggregation task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Config, StatusName};
    use crate::services::reporter::load_logs;
    use crate::storage::{MemoryStorage, load_snapshot, load_status, set_one};
    use crate::testing::FakeSite;

    const LANDING_URL: &str = "https://bb.test/webapps/portal/execute/tabs";

    fn config() -> Config {
        let mut config = Config::default();
        config.portal.base_url = "https://bb.test/".to_string();
        config
    }

    fn controller(site: FakeSite, store: Arc<MemoryStorage>) -> Controller {
        let config = config();
        let engine = AggregationEngine::new(Arc::new(site), store.clone(), &config).unwrap();
        Controller::new(Arc::new(engine), store, config.portal)
    }

    fn landing_site() -> FakeSite {
        FakeSite::new(LANDING_URL)
            .page(
                LANDING_URL,
                r#"<div id="module:_3_1"><ul class="courseListing">
                     <li><a href="/course/c1?type=Course">C1</a></li>
                   </ul></div>"#,
            )
            .page(
                "https://bb.test/course/c1?type=Course",
                r#"<div id="whatsNewView"><ul class="blockGroups">
                     <li id="block::CO-1"><ul class="itemGroups">
                       <li id="o1"><span><a href="/doc">Week 1</a></span></li>
                     </ul></li>
                   </ul></div>"#,
            )
    }

    #[test]
    fn test_command_wire_format() {
        let command: Command = serde_json::from_str(r#"{"type":"START_AGGREGATION"}"#).unwrap();
        assert_eq!(command, Command::StartAggregation);
        assert_eq!(
            serde_json::to_value(Command::ClearData).unwrap(),
            json!({"type": "CLEAR_DATA"})
        );
        assert_eq!(
            serde_json::to_value(Response::ok("x")).unwrap(),
            json!({"status": "ok", "message": "x"})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_in_background() {
        let store = Arc::new(MemoryStorage::new());
        let controller = controller(landing_site(), store.clone());

        let response = controller.handle(Command::StartAggregation).await;
        assert!(response.is_ok());
        controller.wait_idle().await;

        assert!(!controller.is_running());
        let snapshot = load_snapshot(store.as_ref()).await.unwrap();
        assert_eq!(snapshot.others[0].title, "Week 1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_controller_and_run_share_one_log() {
        let store = Arc::new(MemoryStorage::new());
        let controller = controller(landing_site(), store.clone());

        controller.handle(Command::StartAggregation).await;
        controller.wait_idle().await;

        let events: Vec<_> = load_logs(store.as_ref())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert_eq!(events.first().map(String::as_str), Some("MESSAGE_RECEIVED"));
        assert!(events.iter().any(|e| e == "RUN_AGGREGATION_START"));
        assert!(events.iter().any(|e| e == "AGGREGATION_COMPLETE"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected_while_running() {
        let store = Arc::new(MemoryStorage::new());
        let controller = controller(landing_site(), store.clone());

        assert!(controller.handle(Command::StartAggregation).await.is_ok());
        let second = controller.handle(Command::StartAggregation).await;
        let clear = controller.handle(Command::ClearData).await;
        controller.wait_idle().await;

        assert_eq!(second.status, ResponseStatus::Error);
        assert_eq!(clear.status, ResponseStatus::Error);
        assert!(controller.handle(Command::StartAggregation).await.is_ok());
        controller.wait_idle().await;
    }

    #[tokio::test]
    async fn test_start_refused_off_portal() {
        let store = Arc::new(MemoryStorage::new());
        let controller = controller(FakeSite::new("https://elsewhere.test/"), store.clone());

        let response = controller.handle(Command::StartAggregation).await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert!(!controller.is_running());

        let status = load_status(store.as_ref()).await.unwrap();
        assert_eq!(status.name, StatusName::Error);
    }

    #[tokio::test]
    async fn test_clear_data_resets_snapshot() {
        let store = Arc::new(MemoryStorage::new());
        set_one(
            store.as_ref(),
            storage::AGGREGATED_DATA,
            json!({"courses": ["Math"], "others": [{"course": "Math", "title": "x"}]}),
        )
        .await
        .unwrap();
        let controller = controller(landing_site(), store.clone());

        let response = controller.handle(Command::ClearData).await;
        assert!(response.is_ok());

        let snapshot = load_snapshot(store.as_ref()).await.unwrap();
        assert_eq!(snapshot, AggregatedSnapshot::empty());
        assert_eq!(
            storage::get_one(store.as_ref(), storage::AGGREGATED_DATA)
                .await
                .unwrap(),
            Some(json!({
                "announcements": [], "assignments": [], "others": [],
                "courses": [], "lastUpdated": null
            }))
        );
        let status = load_status(store.as_ref()).await.unwrap();
        assert_eq!(status.name, StatusName::Idle);
    }
}
