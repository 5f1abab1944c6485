// src/models/selectors.rs

//! CSS selectors for reading the portal's pages.

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::parse_selector;

/// All selectors the page reader and the engine's waits rely on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default)]
    pub courses: CourseSelectors,

    #[serde(default)]
    pub course_items: CourseItemSelectors,

    #[serde(default)]
    pub announcement_details: AnnouncementSelectors,

    #[serde(default)]
    pub assignment_details: AssignmentSelectors,

    #[serde(default)]
    pub item_type_keywords: ItemTypeKeywords,
}

/// Course list on the landing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseSelectors {
    /// Container of the course list
    #[serde(default = "defaults::course_list_container")]
    pub list_container: String,

    /// Direct child of the container, one per course
    #[serde(default = "defaults::course_item")]
    pub course_item: String,

    /// Link to the course page within an entry
    #[serde(default = "defaults::course_link")]
    pub course_link: String,
}

impl Default for CourseSelectors {
    fn default() -> Self {
        Self {
            list_container: defaults::course_list_container(),
            course_item: defaults::course_item(),
            course_link: defaults::course_link(),
        }
    }
}

/// Item listing on a course page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseItemSelectors {
    /// Container the engine waits for before reading the listing
    #[serde(default = "defaults::items_container")]
    pub container: String,

    /// One block per category, identified by its `id`
    #[serde(default = "defaults::category_block")]
    pub category_block: String,

    #[serde(default = "defaults::item_row")]
    pub item_row: String,

    #[serde(default = "defaults::item_link")]
    pub item_link: String,
}

impl Default for CourseItemSelectors {
    fn default() -> Self {
        Self {
            container: defaults::items_container(),
            category_block: defaults::category_block(),
            item_row: defaults::item_row(),
            item_link: defaults::item_link(),
        }
    }
}

/// Announcement detail view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementSelectors {
    #[serde(default = "defaults::announcement_body")]
    pub body: String,

    #[serde(default = "defaults::author_container")]
    pub author_container: String,

    /// Text preceding the author's name
    #[serde(default = "defaults::author_marker")]
    pub author_marker: String,
}

impl Default for AnnouncementSelectors {
    fn default() -> Self {
        Self {
            body: defaults::announcement_body(),
            author_container: defaults::author_container(),
            author_marker: defaults::author_marker(),
        }
    }
}

/// Assignment detail view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentSelectors {
    /// First match holds the due date
    #[serde(default = "defaults::due_date")]
    pub due_date: String,

    #[serde(default = "defaults::instructions_container")]
    pub instructions_container: String,

    #[serde(default = "defaults::attachments")]
    pub attachments: String,
}

impl Default for AssignmentSelectors {
    fn default() -> Self {
        Self {
            due_date: defaults::due_date(),
            instructions_container: defaults::instructions_container(),
            attachments: defaults::attachments(),
        }
    }
}

/// Substrings of a category block's id that mark its item type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemTypeKeywords {
    #[serde(default = "defaults::announcement_keyword")]
    pub announcement: String,

    #[serde(default = "defaults::assignment_keyword")]
    pub assignment: String,
}

impl Default for ItemTypeKeywords {
    fn default() -> Self {
        Self {
            announcement: defaults::announcement_keyword(),
            assignment: defaults::assignment_keyword(),
        }
    }
}

/// Parsed form of a [`SelectorConfig`].
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub course_entries: Selector,
    pub course_link: Selector,
    pub category_blocks: Selector,
    pub item_row: Selector,
    pub item_link: Selector,
    pub announcement_body: Selector,
    pub author_container: Selector,
    pub paragraph: Selector,
    pub due_date: Selector,
    pub instructions: Selector,
    pub attachments: Selector,
    pub author_marker: String,
    /// Upper-cased keywords
    pub announcement_keyword: String,
    pub assignment_keyword: String,
}

impl SelectorConfig {
    /// Parse every selector, failing on the first invalid one.
    pub fn compile(&self) -> Result<CompiledSelectors> {
        Ok(CompiledSelectors {
            course_entries: parse_selector(&format!(
                "{} > {}",
                self.courses.list_container, self.courses.course_item
            ))?,
            course_link: parse_selector(&self.courses.course_link)?,
            category_blocks: parse_selector(&format!(
                "{} {}",
                self.course_items.container, self.course_items.category_block
            ))?,
            item_row: parse_selector(&self.course_items.item_row)?,
            item_link: parse_selector(&self.course_items.item_link)?,
            announcement_body: parse_selector(&self.announcement_details.body)?,
            author_container: parse_selector(&self.announcement_details.author_container)?,
            paragraph: parse_selector("p")?,
            due_date: parse_selector(&self.assignment_details.due_date)?,
            instructions: parse_selector(&self.assignment_details.instructions_container)?,
            attachments: parse_selector(&self.assignment_details.attachments)?,
            author_marker: self.announcement_details.author_marker.clone(),
            announcement_keyword: self.item_type_keywords.announcement.to_uppercase(),
            assignment_keyword: self.item_type_keywords.assignment.to_uppercase(),
        })
    }
}

mod defaults {
    pub fn course_list_container() -> String {
        "[id='module:_3_1'] ul.courseListing".into()
    }
    pub fn course_item() -> String {
        "li".into()
    }
    pub fn course_link() -> String {
        "a[href*='type=Course']".into()
    }

    pub fn items_container() -> String {
        "#whatsNewView".into()
    }
    pub fn category_block() -> String {
        "ul.blockGroups > li[id^=\"block::\"]".into()
    }
    pub fn item_row() -> String {
        "ul.itemGroups > li".into()
    }
    pub fn item_link() -> String {
        "a".into()
    }

    pub fn announcement_body() -> String {
        "div.vtbegenerated".into()
    }
    pub fn author_container() -> String {
        "div.announcementInfo".into()
    }
    pub fn author_marker() -> String {
        "Posted by:".into()
    }

    pub fn due_date() -> String {
        "#metadata .metaField".into()
    }
    pub fn instructions_container() -> String {
        "#instructions".into()
    }
    pub fn attachments() -> String {
        "#instructions a".into()
    }

    pub fn announcement_keyword() -> String {
        "::AN".into()
    }
    pub fn assignment_keyword() -> String {
        "::AS".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_default_selectors_compile() {
        assert!(SelectorConfig::default().compile().is_ok());
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut config = SelectorConfig::default();
        config.assignment_details.due_date = "[[invalid".to_string();
        let err = config.compile().unwrap_err();
        assert!(matches!(err, AppError::Selector { .. }));
    }

    #[test]
    fn test_keywords_upper_cased() {
        let mut config = SelectorConfig::default();
        config.item_type_keywords.announcement = "::an".to_string();
        let compiled = config.compile().unwrap();
        assert_eq!(compiled.announcement_keyword, "::AN");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SelectorConfig = toml::from_str(
            r##"
            [course_items]
            container = "#main"
            "##,
        )
        .unwrap();
        assert_eq!(config.course_items.container, "#main");
        assert_eq!(config.course_items.item_row, "ul.itemGroups > li");
        assert_eq!(config.announcement_details.author_marker, "Posted by:");
    }
}
