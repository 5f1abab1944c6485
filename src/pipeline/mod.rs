//! Aggregation pipeline.
//!
//! - `engine`: One sequential crawl over every listed course
//! - `store`: Working snapshot with the identity index and closing dedupe
//! - `export`: Snapshot to JSON file
//! - `attachments`: Attachment listing and download

pub mod attachments;
pub mod engine;
pub mod export;
pub mod store;

pub use attachments::{
    DownloadSummary, DownloadableAttachment, FilenamePlanner, collect_attachments, download_all,
};
pub use engine::{AggregationEngine, RunReport};
pub use export::{default_export_file_name, export_snapshot};
pub use store::AggregationStore;
