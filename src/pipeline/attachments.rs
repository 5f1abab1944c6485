// src/pipeline/attachments.rs

//! Assignment attachment listing and download.
//!
//! Files are laid out as `<course>/<assignment>/<file>`; clashing names get
//! a `(n)` counter before the extension.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tokio::fs;
use url::Url;

use crate::error::Result;
use crate::models::AggregatedSnapshot;
use crate::utils::sanitize_path_part;

/// An attachment together with the assignment it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadableAttachment {
    pub course: String,
    pub assignment_title: String,
    pub due_date: Option<String>,
    pub text: String,
    pub url: String,
}

/// Outcome of a download batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Attachments of stored assignments, optionally for one course.
///
/// Entries without a URL are skipped; each URL is listed once.
pub fn collect_attachments(
    snapshot: &AggregatedSnapshot,
    course: Option<&str>,
) -> Vec<DownloadableAttachment> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for assignment in snapshot
        .assignments
        .iter()
        .filter(|a| course.is_none_or(|c| a.course == c))
    {
        for attachment in assignment.attachments.iter().flatten() {
            if attachment.url.is_empty() || !seen.insert(attachment.url.clone()) {
                continue;
            }
            found.push(DownloadableAttachment {
                course: assignment.course.clone(),
                assignment_title: assignment.title.clone(),
                due_date: assignment.due_date.clone(),
                text: attachment.text.clone(),
                url: attachment.url.clone(),
            });
        }
    }
    found
}

fn url_extension() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.([^./\\]+)$").expect("static pattern"))
}

fn name_extension() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.[A-Za-z0-9]{1,6}$").expect("static pattern"))
}

/// Assigns relative download paths, numbering repeats.
#[derive(Debug, Default)]
pub struct FilenamePlanner {
    counts: HashMap<String, usize>,
}

impl FilenamePlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative path for the `index`-th attachment of a batch.
    pub fn plan(&mut self, attachment: &DownloadableAttachment, index: usize) -> PathBuf {
        let course = sanitize_path_part(&attachment.course, "course");
        let assignment = sanitize_path_part(&attachment.assignment_title, "assignment");
        let default_name = format!("attachment_{}", index + 1);
        let raw_name = sanitize_path_part(&attachment.text, &default_name);

        let extension = Url::parse(&attachment.url)
            .ok()
            .and_then(|url| {
                url_extension()
                    .captures(url.path())
                    .map(|caps| format!(".{}", &caps[1]))
            })
            .unwrap_or_default();

        let mut file_name = if name_extension().is_match(&raw_name) {
            raw_name
        } else {
            format!("{raw_name}{extension}")
        };

        let key = format!("{course}|{assignment}|{file_name}");
        let count = self.counts.entry(key).or_insert(0);
        if *count > 0 {
            let suffix = format!("({})", *count + 1);
            file_name = match file_name.rfind('.') {
                Some(dot) if dot > 0 => {
                    format!("{}{}{}", &file_name[..dot], suffix, &file_name[dot..])
                }
                _ => format!("{file_name}{suffix}"),
            };
        }
        *count += 1;

        [course, assignment, file_name].iter().collect()
    }
}

/// Download every attachment into `target_dir`, one after another.
///
/// A failed file is logged and counted; the batch carries on.
pub async fn download_all(
    client: &reqwest::Client,
    attachments: &[DownloadableAttachment],
    target_dir: &Path,
) -> DownloadSummary {
    let mut planner = FilenamePlanner::new();
    let mut summary = DownloadSummary::default();

    for (index, attachment) in attachments.iter().enumerate() {
        let path = target_dir.join(planner.plan(attachment, index));
        match download_one(client, &attachment.url, &path).await {
            Ok(bytes) => {
                summary.succeeded += 1;
                log::info!("Downloaded {} ({} bytes)", path.display(), bytes);
            }
            Err(e) => {
                summary.failed += 1;
                log::warn!("Failed to download {}: {}", attachment.url, e);
            }
        }
    }
    summary
}

async fn download_one(client: &reqwest::Client, url: &str, path: &Path) -> Result<usize> {
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, &bytes).await?;
    Ok(bytes.len())
}
