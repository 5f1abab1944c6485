// src/services/reader.rs

//! Page reader.
//!
//! Pure extraction over a parsed page. Nothing here touches the browsing
//! context; missing elements produce empty fields, never errors.

use scraper::{ElementRef, Html};
use url::Url;

use crate::models::{
    AnnouncementDetail, AssignmentDetail, Attachment, CompiledSelectors, Course, ItemSummary,
    ItemType,
};
use crate::utils::resolve_url;

/// A parsed page together with the URL it was loaded from.
pub struct Page {
    pub document: Html,
    pub url: Option<Url>,
}

impl Page {
    pub fn parse(html: &str, url: Option<Url>) -> Self {
        Self {
            document: Html::parse_document(html),
            url,
        }
    }

    /// Absolute form of an `href`, relative to this page.
    fn absolute(&self, href: &str) -> String {
        match &self.url {
            Some(base) => resolve_url(base, href),
            None => href.to_string(),
        }
    }
}

/// Courses listed on the landing page. Entries without a course link are skipped.
pub fn extract_courses(page: &Page, selectors: &CompiledSelectors) -> Vec<Course> {
    page.document
        .select(&selectors.course_entries)
        .filter_map(|entry| {
            let link = entry.select(&selectors.course_link).next()?;
            Some(Course {
                name: element_text(&link).trim().to_string(),
                url: page.absolute(link.value().attr("href").unwrap_or("")),
            })
        })
        .collect()
}

/// Items listed on a course page, in page order.
///
/// Rows need both a link and an `id`; the id anchors the click handle.
pub fn extract_course_items(page: &Page, selectors: &CompiledSelectors) -> Vec<ItemSummary> {
    let mut items = Vec::new();
    for block in page.document.select(&selectors.category_blocks) {
        let kind = classify_block(block.value().id().unwrap_or(""), selectors);
        for row in block.select(&selectors.item_row) {
            let Some(link) = row.select(&selectors.item_link).next() else {
                continue;
            };
            let Some(row_id) = row.value().id().filter(|id| !id.is_empty()) else {
                continue;
            };
            items.push(ItemSummary {
                title: element_text(&link).trim().to_string(),
                kind,
                handle: click_handle(row_id),
            });
        }
    }
    items
}

/// Body markup and author of an open announcement.
pub fn extract_announcement_detail(page: &Page, selectors: &CompiledSelectors) -> AnnouncementDetail {
    let body = page
        .document
        .select(&selectors.announcement_body)
        .next()
        .map(|el| el.inner_html().trim().to_string());

    let marker = selectors.author_marker.as_str();
    let author = page
        .document
        .select(&selectors.author_container)
        .next()
        .and_then(|container| {
            container
                .select(&selectors.paragraph)
                .map(|p| element_text(&p))
                .find(|text| text.contains(marker))
        })
        .map(|text| text.replacen(marker, "", 1).trim().to_string());

    AnnouncementDetail { body, author }
}

/// Due date, instruction markup and attachment links of an open assignment.
pub fn extract_assignment_detail(page: &Page, selectors: &CompiledSelectors) -> AssignmentDetail {
    let due_date = page
        .document
        .select(&selectors.due_date)
        .next()
        .map(|el| collapse_lines(&element_text(&el)));

    let instructions = page
        .document
        .select(&selectors.instructions)
        .next()
        .map(|el| el.inner_html().trim().to_string());

    let attachments = page
        .document
        .select(&selectors.attachments)
        .map(|a| Attachment {
            text: element_text(&a),
            url: a
                .value()
                .attr("href")
                .map(|href| page.absolute(href))
                .unwrap_or_default(),
        })
        .collect();

    AssignmentDetail {
        due_date,
        instructions,
        attachments,
    }
}

/// Type of the items in a category block, from its id.
fn classify_block(block_id: &str, selectors: &CompiledSelectors) -> ItemType {
    let id = block_id.to_uppercase();
    if !selectors.announcement_keyword.is_empty() && id.contains(&selectors.announcement_keyword) {
        ItemType::Announcement
    } else if !selectors.assignment_keyword.is_empty() && id.contains(&selectors.assignment_keyword)
    {
        ItemType::Assignment
    } else {
        ItemType::Other
    }
}

/// Selector for the link inside the row with the given id.
fn click_handle(row_id: &str) -> String {
    let escaped = row_id.replace('\\', "\\\\").replace('"', "\\\"");
    format!("li[id=\"{escaped}\"] > span > a")
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

/// Trim and join the non-blank lines of `text` with single spaces.
///
/// Element text includes the markup's indentation, so line breaks are
/// folded the way a rendered page shows them rather than one-for-one.
fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SelectorConfig;
    use crate::utils::parse_selector;

    fn selectors() -> CompiledSelectors {
        SelectorConfig::default().compile().unwrap()
    }

    fn page(html: &str) -> Page {
        Page::parse(html, Url::parse("https://bb.example.edu/webapps/portal/").ok())
    }

    const LANDING: &str = r#"
        <div id="module:_3_1">
          <ul class="courseListing">
            <li><a href="/webapps/blackboard/execute/launcher?type=Course&id=_1_1">  Math101 </a></li>
            <li><span>Orphan entry without link</span></li>
            <li><a href="https://bb.example.edu/launcher?type=Course&id=_2_1">Physics</a></li>
          </ul>
        </div>"#;

    const COURSE: &str = r##"
        <div id="whatsNewView">
          <ul class="blockGroups">
            <li id="block::an-1">
              <ul class="itemGroups">
                <li id="item:_1"><span><a href="#">Welcome</a></span></li>
                <li><span><a href="#">No id</a></span></li>
              </ul>
            </li>
            <li id="block::AS-2">
              <ul class="itemGroups">
                <li id="item:_2"><span><a href="/hw1">HW1</a></span></li>
                <li id="item:_3"><span>no link</span></li>
              </ul>
            </li>
            <li id="block::CO-3">
              <ul class="itemGroups">
                <li id="item:_4"><span><a href="/doc">Syllabus</a></span></li>
              </ul>
            </li>
          </ul>
        </div>"##;

    #[test]
    fn test_extract_courses_skips_entries_without_link() {
        let courses = extract_courses(&page(LANDING), &selectors());
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].name, "Math101");
        assert_eq!(
            courses[0].url,
            "https://bb.example.edu/webapps/blackboard/execute/launcher?type=Course&id=_1_1"
        );
        assert_eq!(courses[1].name, "Physics");
    }

    #[test]
    fn test_extract_course_items_classifies_blocks() {
        let items = extract_course_items(&page(COURSE), &selectors());
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Welcome", "HW1", "Syllabus"]);
        assert_eq!(items[0].kind, ItemType::Announcement);
        assert_eq!(items[1].kind, ItemType::Assignment);
        assert_eq!(items[2].kind, ItemType::Other);
    }

    #[test]
    fn test_click_handle_selects_row_link() {
        let items = extract_course_items(&page(COURSE), &selectors());
        let handle = parse_selector(&items[1].handle).unwrap();
        let document = Html::parse_document(COURSE);
        let link = document.select(&handle).next().unwrap();
        assert_eq!(link.value().attr("href"), Some("/hw1"));
    }

    #[test]
    fn test_extract_announcement_detail() {
        let html = r#"
            <div class="vtbegenerated"> <p>Exam moved to <b>Friday</b></p> </div>
            <div class="announcementInfo">
              <p>Posted on: Monday</p>
              <p>Posted by: Dr. Chen</p>
            </div>"#;
        let detail = extract_announcement_detail(&page(html), &selectors());
        assert_eq!(
            detail.body.as_deref(),
            Some("<p>Exam moved to <b>Friday</b></p>")
        );
        assert_eq!(detail.author.as_deref(), Some("Dr. Chen"));
    }

    #[test]
    fn test_announcement_detail_tolerates_missing_elements() {
        let detail = extract_announcement_detail(&page("<p>nothing</p>"), &selectors());
        assert_eq!(detail, AnnouncementDetail::default());
    }

    #[test]
    fn test_collapse_lines_folds_breaks_and_indentation() {
        assert_eq!(collapse_lines("a\n\nb"), "a b");
        assert_eq!(collapse_lines("\n    Due:\r\n    Oct 5  \n"), "Due: Oct 5");
        assert_eq!(collapse_lines("  single  "), "single");
        assert_eq!(collapse_lines(" \n "), "");
    }

    #[test]
    fn test_extract_assignment_detail() {
        let html = r#"
            <div id="metadata">
              <div class="metaField">
                Due Date
                Oct 5, 2026 23:59
              </div>
              <div class="metaField">Points 10</div>
            </div>
            <div id="instructions">
              <p>Read chapter 3.</p>
              <a href="/files/sheet.pdf">sheet.pdf</a>
              <a>no href</a>
            </div>"#;
        let detail = extract_assignment_detail(&page(html), &selectors());
        assert_eq!(detail.due_date.as_deref(), Some("Due Date Oct 5, 2026 23:59"));
        assert!(detail.instructions.unwrap().starts_with("<p>Read chapter 3.</p>"));
        assert_eq!(detail.attachments.len(), 2);
        assert_eq!(detail.attachments[0].text, "sheet.pdf");
        assert_eq!(
            detail.attachments[0].url,
            "https://bb.example.edu/files/sheet.pdf"
        );
        assert_eq!(detail.attachments[1].url, "");
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let p = page(COURSE);
        let s = selectors();
        assert_eq!(extract_course_items(&p, &s), extract_course_items(&p, &s));
    }
}
