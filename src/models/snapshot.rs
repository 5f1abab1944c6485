// src/models/snapshot.rs

//! The aggregated snapshot shared with the viewer, export and download layers.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{ItemRecord, ItemType};

/// Everything collected so far, persisted as one value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedSnapshot {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub announcements: Vec<ItemRecord>,

    #[serde(default, deserialize_with = "lenient_vec")]
    pub assignments: Vec<ItemRecord>,

    #[serde(default, deserialize_with = "lenient_vec")]
    pub others: Vec<ItemRecord>,

    /// Course names in first-seen order, without repeats
    #[serde(default, deserialize_with = "lenient_vec")]
    pub courses: Vec<String>,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl AggregatedSnapshot {
    /// The cleared state: no records, no courses, no timestamp.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decode a stored value.
    ///
    /// Anything other than a JSON object (or `null`, read as empty) is
    /// unreadable. Inside an object, malformed parts are dropped; a stored
    /// record is kept whole as long as it is an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::empty()),
            Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| AppError::SnapshotUnreadable(e.to_string())),
            other => Err(AppError::SnapshotUnreadable(format!(
                "expected an object, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// The three record collections with the type each one implies.
    pub fn collections(&self) -> [(ItemType, &[ItemRecord]); 3] {
        [
            (ItemType::Announcement, self.announcements.as_slice()),
            (ItemType::Assignment, self.assignments.as_slice()),
            (ItemType::Other, self.others.as_slice()),
        ]
    }

    pub fn record_count(&self) -> usize {
        self.announcements.len() + self.assignments.len() + self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0 && self.courses.is_empty()
    }

    /// A copy restricted to one course; `None` keeps everything.
    pub fn filter_by_course(&self, course: Option<&str>) -> Self {
        let Some(course) = course else {
            return self.clone();
        };
        let keep = |records: &[ItemRecord]| -> Vec<ItemRecord> {
            records
                .iter()
                .filter(|r| r.course == course)
                .cloned()
                .collect()
        };
        Self {
            announcements: keep(&self.announcements),
            assignments: keep(&self.assignments),
            others: keep(&self.others),
            courses: self
                .courses
                .iter()
                .filter(|c| c.as_str() == course)
                .cloned()
                .collect(),
            last_updated: self.last_updated,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Reads an array, skipping elements that do not decode; anything else is empty.
fn lenient_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    })
}
