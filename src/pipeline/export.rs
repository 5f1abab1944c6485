// src/pipeline/export.rs

//! Export of the stored snapshot to a JSON file.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::fs;

use crate::error::{AppError, Result};
use crate::models::AggregatedSnapshot;

/// `blackboard_data_YYYY-MM-DD.json` for the given day.
pub fn default_export_file_name(date: NaiveDate) -> String {
    format!("blackboard_data_{}.json", date.format("%Y-%m-%d"))
}

/// Write `snapshot` as pretty-printed JSON to `path`.
///
/// Refuses to write a snapshot with no records and no courses.
pub async fn export_snapshot(snapshot: &AggregatedSnapshot, path: &Path) -> Result<PathBuf> {
    if snapshot.is_empty() {
        return Err(AppError::validation("No data to export; run a sync first"));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json).await?;

    log::info!(
        "Exported {} records to {}",
        snapshot.record_count(),
        path.display()
    );
    Ok(path.to_path_buf())
}
