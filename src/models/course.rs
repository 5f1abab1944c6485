// src/models/course.rs

//! Courses and the item summaries listed on a course page.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A course discovered on the portal landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Display name, also used as the course component of identity keys
    pub name: String,

    /// Absolute URL of the course page
    pub url: String,
}

/// Category of a listed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Announcement,
    Assignment,
    Other,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Announcement => "announcement",
            ItemType::Assignment => "assignment",
            ItemType::Other => "other",
        }
    }

    /// Whether the item has to be opened to read its fields.
    pub fn needs_detail(&self) -> bool {
        matches!(self, ItemType::Announcement | ItemType::Assignment)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item row as listed on a course page.
///
/// Only lives for the duration of one course visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSummary {
    pub title: String,
    pub kind: ItemType,

    /// Selector that opens the item's detail view when clicked
    pub handle: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_type_serde() {
        let json = serde_json::to_string(&ItemType::Assignment).unwrap();
        assert_eq!(json, "\"assignment\"");
        let parsed: ItemType = serde_json::from_str("\"other\"").unwrap();
        assert_eq!(parsed, ItemType::Other);
    }

    #[test]
    fn test_needs_detail() {
        assert!(ItemType::Announcement.needs_detail());
        assert!(ItemType::Assignment.needs_detail());
        assert!(!ItemType::Other.needs_detail());
    }
}
