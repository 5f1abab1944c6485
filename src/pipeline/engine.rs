// src/pipeline/engine.rs

//! The crawl engine.
//!
//! One run walks every course listed on the current page, opens each item
//! not captured yet, and merges what it reads into the stored snapshot.
//! Everything happens sequentially in the single browsing context.
//!
//! Failures are contained at three levels: an item failure skips the item,
//! a course failure skips the course, a run failure ends the run. Whatever
//! happens, the context is sent back to the page the run started from.

use std::sync::Arc;

use chrono::{Local, Utc};
use serde::Serialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{
    AggregatedSnapshot, CompiledSelectors, Config, Course, IdentityKey, ItemRecord, ItemSummary,
    ItemType, RunStatus,
};
use crate::pipeline::store::AggregationStore;
use crate::services::navigator::{BrowsingContext, Navigator};
use crate::services::reader;
use crate::services::reporter::StatusReporter;
use crate::storage::{self, KeyValueStore};

/// Counters and advisories from one run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunReport {
    pub courses_total: usize,
    pub courses_failed: usize,
    pub items_captured: usize,
    pub items_skipped: usize,
    pub items_failed: usize,
    /// Records removed by the closing dedupe pass
    pub records_dropped: usize,
    pub warnings: Vec<String>,
}

/// Selectors the engine waits on.
struct WaitTargets {
    listing: String,
    announcement: String,
    assignment: String,
}

/// Drives aggregation runs over one browsing context.
pub struct AggregationEngine {
    navigator: Navigator,
    store: Arc<dyn KeyValueStore>,
    reporter: StatusReporter,
    selectors: CompiledSelectors,
    waits: WaitTargets,
}

impl AggregationEngine {
    pub fn new(
        context: Arc<dyn BrowsingContext>,
        store: Arc<dyn KeyValueStore>,
        config: &Config,
    ) -> Result<Self> {
        let selectors = config.selectors.compile()?;
        Ok(Self {
            navigator: Navigator::new(context, &config.navigation),
            reporter: StatusReporter::new(store.clone(), config.logging.max_entries),
            store,
            selectors,
            waits: WaitTargets {
                listing: config.selectors.course_items.container.clone(),
                announcement: config.selectors.announcement_details.body.clone(),
                assignment: config
                    .selectors
                    .assignment_details
                    .instructions_container
                    .clone(),
            },
        })
    }

    /// The reporter runs log through; share it with other writers.
    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    /// URL of the page the context currently shows.
    pub async fn current_url(&self) -> Result<String> {
        self.navigator.current_url().await
    }

    /// Run one aggregation.
    ///
    /// The outcome is also reflected in the status cell. The context is
    /// returned to the starting page last, whether the run succeeded or not.
    pub async fn run(&self) -> Result<RunReport> {
        let origin = match self.navigator.current_url().await {
            Ok(url) => url,
            Err(e) => {
                self.reporter
                    .error("RUN_AGGREGATION_FAILED", json!({ "error": e.to_string() }))
                    .await;
                self.reporter
                    .set_status(RunStatus::error(format!("Error: {e}")))
                    .await;
                return Err(e);
            }
        };

        self.reporter
            .info("RUN_AGGREGATION_START", json!({ "originalUrl": origin }))
            .await;

        let outcome = self.aggregate().await;
        match &outcome {
            Ok(_) => {
                let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
                self.reporter
                    .set_status(RunStatus::idle(format!("Sync complete! Last updated: {stamp}")))
                    .await;
            }
            Err(e) => {
                self.reporter
                    .error(
                        "RUN_AGGREGATION_FAILED",
                        json!({ "error": e.to_string(), "scope": format!("{:?}", e.scope()) }),
                    )
                    .await;
                self.reporter
                    .set_status(RunStatus::error(format!("Error: {e}")))
                    .await;
            }
        }

        self.reporter
            .info("NAVIGATING_BACK_TO_ORIGINAL_URL", json!({ "url": origin }))
            .await;
        if let Err(e) = self.navigator.load_and_await_complete(&origin).await {
            self.reporter
                .error(
                    "RESTORE_ORIGIN_FAILED",
                    json!({ "url": origin, "error": e.to_string() }),
                )
                .await;
        }

        outcome
    }

    /// Traverse, merge and persist. Errors returned here end the run.
    async fn aggregate(&self) -> Result<RunReport> {
        self.reporter
            .set_status(RunStatus::running("Starting sync: reading the course list..."))
            .await;

        let courses = self
            .navigator
            .run_in_page(|page| reader::extract_courses(page, &self.selectors))
            .await?;
        if courses.is_empty() {
            return Err(AppError::NoCourses);
        }
        self.reporter
            .success("EXTRACTED_COURSES", json!({ "count": courses.len() }))
            .await;

        let existing = storage::load_snapshot(self.store.as_ref())
            .await
            .map_err(|e| match e {
                AppError::SnapshotUnreadable(_) => e,
                other => AppError::SnapshotUnreadable(other.to_string()),
            })?;

        let (snapshot, report) = self.collect(&courses, existing).await;
        self.reporter
            .success(
                "AGGREGATION_COMPLETE",
                json!({
                    "announcements": snapshot.announcements.len(),
                    "assignments": snapshot.assignments.len(),
                    "others": snapshot.others.len(),
                    "itemsCaptured": report.items_captured,
                    "itemsSkipped": report.items_skipped,
                    "itemsFailed": report.items_failed,
                    "coursesFailed": report.courses_failed,
                }),
            )
            .await;

        storage::save_snapshot(self.store.as_ref(), &snapshot).await?;
        Ok(report)
    }

    /// Visit every course, merging into `existing`. Never fails as a whole.
    async fn collect(
        &self,
        courses: &[Course],
        existing: AggregatedSnapshot,
    ) -> (AggregatedSnapshot, RunReport) {
        let mut store = AggregationStore::seed(existing);
        let mut report = RunReport {
            courses_total: courses.len(),
            ..RunReport::default()
        };

        for course in courses {
            if let Err(e) = self.process_course(course, &mut store, &mut report).await {
                report.courses_failed += 1;
                self.reporter
                    .error(
                        "COURSE_PROCESSING_FAILED",
                        json!({ "courseName": course.name, "error": e.to_string() }),
                    )
                    .await;
            }
        }

        let (snapshot, dropped) = store.finish(Utc::now());
        report.records_dropped = dropped;
        (snapshot, report)
    }

    async fn process_course(
        &self,
        course: &Course,
        store: &mut AggregationStore,
        report: &mut RunReport,
    ) -> Result<()> {
        store.register_course(&course.name);
        self.reporter
            .set_status(RunStatus::running(format!(
                "Processing course: {}",
                course.name
            )))
            .await;
        self.reporter
            .info(
                "PROCESSING_COURSE",
                json!({ "courseName": course.name, "url": course.url }),
            )
            .await;

        self.navigator.load_and_await_complete(&course.url).await?;
        if !self.wait_for(&self.waits.listing).await {
            return Err(AppError::CourseTimeout {
                course: course.name.clone(),
                selector: self.waits.listing.clone(),
            });
        }

        let items = self
            .navigator
            .run_in_page(|page| reader::extract_course_items(page, &self.selectors))
            .await?;
        self.reporter
            .info(
                "EXTRACTED_COURSE_ITEMS",
                json!({ "courseName": course.name, "count": items.len() }),
            )
            .await;

        let mut listing_stale = false;
        for (index, item) in items.iter().enumerate() {
            let key = IdentityKey::new(item.kind, course.name.as_str(), item.title.as_str());
            if store.contains(&key) {
                report.items_skipped += 1;
                self.reporter
                    .info(
                        "ITEM_SKIPPED_ALREADY_EXISTS",
                        json!({ "courseName": course.name, "itemTitle": item.title, "type": item.kind }),
                    )
                    .await;
                continue;
            }

            let mut detail_entered = false;
            let outcome = self
                .process_item(course, item, index + 1, &mut listing_stale, &mut detail_entered)
                .await;
            match outcome {
                Ok(record) => {
                    store.append(record);
                    report.items_captured += 1;
                    self.reporter
                        .success(
                            "EXTRACTED_ITEM_DETAILS",
                            json!({ "courseName": course.name, "itemTitle": item.title, "type": item.kind }),
                        )
                        .await;
                }
                Err(e) => {
                    report.items_failed += 1;
                    self.reporter
                        .error(
                            "ITEM_PROCESSING_FAILED",
                            json!({
                                "courseName": course.name,
                                "itemTitle": item.title,
                                "error": e.to_string(),
                            }),
                        )
                        .await;
                }
            }

            if detail_entered {
                match self.return_to_listing(course).await {
                    Ok(()) => listing_stale = false,
                    Err(e) => {
                        listing_stale = true;
                        report.warnings.push(e.to_string());
                        self.reporter
                            .warn(
                                "RETURN_TO_COURSE_FAILED",
                                json!({ "courseName": course.name, "error": e.to_string() }),
                            )
                            .await;
                    }
                }
            }
        }
        Ok(())
    }

    /// Capture one item.
    ///
    /// `detail_entered` is set once a click may have left the listing, so
    /// the caller knows to go back even when this fails.
    async fn process_item(
        &self,
        course: &Course,
        item: &ItemSummary,
        position: usize,
        listing_stale: &mut bool,
        detail_entered: &mut bool,
    ) -> Result<ItemRecord> {
        self.reporter
            .set_status(RunStatus::running(format!(
                "Processing: {} > {}",
                course.name, item.title
            )))
            .await;
        self.reporter
            .info(
                "PROCESSING_ITEM",
                json!({
                    "courseName": course.name,
                    "itemTitle": item.title,
                    "type": item.kind,
                    "position": position,
                }),
            )
            .await;

        let detail_selector = match item.kind {
            ItemType::Other => return Ok(ItemRecord::other(&course.name, item)),
            ItemType::Announcement => &self.waits.announcement,
            ItemType::Assignment => &self.waits.assignment,
        };

        if *listing_stale {
            self.return_to_listing(course)
                .await
                .map_err(|_| AppError::ListingUnavailable {
                    course: course.name.clone(),
                })?;
            *listing_stale = false;
            self.reporter
                .info("LISTING_RECOVERED", json!({ "courseName": course.name }))
                .await;
        }

        *detail_entered = true;
        if !self.navigator.click(&item.handle).await? {
            *detail_entered = false;
            return Err(AppError::InteractionTarget {
                selector: item.handle.clone(),
            });
        }

        if !self.wait_for(detail_selector).await {
            return Err(AppError::DetailTimeout {
                title: item.title.clone(),
                selector: detail_selector.clone(),
            });
        }

        if item.kind == ItemType::Announcement {
            let detail = self
                .navigator
                .run_in_page(|page| reader::extract_announcement_detail(page, &self.selectors))
                .await?;
            Ok(ItemRecord::announcement(&course.name, item, detail))
        } else {
            let detail = self
                .navigator
                .run_in_page(|page| reader::extract_assignment_detail(page, &self.selectors))
                .await?;
            Ok(ItemRecord::assignment(&course.name, item, detail))
        }
    }

    /// Reload the course page and wait for its listing.
    async fn return_to_listing(&self, course: &Course) -> Result<()> {
        self.navigator
            .load_and_await_complete(&course.url)
            .await
            .map_err(|e| AppError::return_to_listing(&course.name, e))?;
        if !self.wait_for(&self.waits.listing).await {
            return Err(AppError::return_to_listing(
                &course.name,
                format!("{} did not appear", self.waits.listing),
            ));
        }
        Ok(())
    }

    /// Bounded wait for `selector`, logged either way.
    async fn wait_for(&self, selector: &str) -> bool {
        self.reporter
            .info("WAIT_FOR_ELEMENT", json!({ "selector": selector }))
            .await;
        let found = self.navigator.await_element_present(selector).await;
        if found {
            self.reporter
                .success("ELEMENT_FOUND", json!({ "selector": selector }))
                .await;
        } else {
            self.reporter
                .error("WAIT_FOR_ELEMENT_TIMEOUT", json!({ "selector": selector }))
                .await;
        }
        found
    }
}
