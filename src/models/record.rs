// src/models/record.rs

//! Persisted item records and their identity keys.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::models::{ItemSummary, ItemType};

/// A link found in an assignment's instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fields read from an announcement's detail view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnouncementDetail {
    pub body: Option<String>,
    pub author: Option<String>,
}

/// Fields read from an assignment's detail view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentDetail {
    pub due_date: Option<String>,
    pub instructions: Option<String>,
    pub attachments: Vec<Attachment>,
}

/// A captured item, as stored in the snapshot.
///
/// Every field but `course` and `title` may be missing in stored data.
/// Unknown fields, and known fields whose stored value does not fit, are
/// carried through untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub course: String,

    pub title: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ItemType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decodes any JSON object. A field that does not decode stays in `extra`
/// under its stored name, so writing the record back loses nothing.
impl<'de> Deserialize<'de> for ItemRecord {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self {
            course: take_field(&mut fields, "course").unwrap_or_default(),
            title: take_field(&mut fields, "title").unwrap_or_default(),
            kind: take_field(&mut fields, "type"),
            due_date: take_field(&mut fields, "dueDate"),
            author: take_field(&mut fields, "author"),
            body: take_field(&mut fields, "body"),
            instructions: take_field(&mut fields, "instructions"),
            attachments: take_field(&mut fields, "attachments"),
            extra: fields,
        })
    }
}

/// Remove `key` from `fields` if its value decodes as `T`.
fn take_field<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<T> {
    let decoded = T::deserialize(fields.get(key)?).ok()?;
    fields.remove(key);
    Some(decoded)
}

impl ItemRecord {
    fn base(course: &str, summary: &ItemSummary, kind: ItemType) -> Self {
        Self {
            course: course.to_string(),
            title: summary.title.clone(),
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// The stored `type` when it is not one this crate knows.
    pub fn raw_type(&self) -> Option<&Value> {
        self.extra.get("type")
    }

    /// Record for an item that has no detail view.
    pub fn other(course: &str, summary: &ItemSummary) -> Self {
        Self::base(course, summary, summary.kind)
    }

    pub fn announcement(course: &str, summary: &ItemSummary, detail: AnnouncementDetail) -> Self {
        Self {
            body: detail.body,
            author: detail.author,
            ..Self::base(course, summary, ItemType::Announcement)
        }
    }

    pub fn assignment(course: &str, summary: &ItemSummary, detail: AssignmentDetail) -> Self {
        Self {
            due_date: detail.due_date,
            instructions: detail.instructions,
            attachments: Some(detail.attachments),
            ..Self::base(course, summary, ItemType::Assignment)
        }
    }
}

/// The `(type, course, title)` triple identifying a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub kind: ItemType,
    pub course: String,
    pub title: String,
}

impl IdentityKey {
    pub fn new(kind: ItemType, course: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind,
            course: course.into(),
            title: title.into(),
        }
    }

    /// Key of a stored record, using `fallback` when the record has no type.
    ///
    /// Returns `None` for records missing a course or title.
    pub fn for_record(record: &ItemRecord, fallback: ItemType) -> Option<Self> {
        if record.course.is_empty() || record.title.is_empty() {
            return None;
        }
        Some(Self::new(
            record.kind.unwrap_or(fallback),
            record.course.as_str(),
            record.title.as_str(),
        ))
    }
}
