// src/models/selectors.rs

//! CSS selectors for scraping the Moodle grade report pages.

use serde::{Deserialize, Serialize};

/// CSS selectors for the overview and per-course grade pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeSelectors {
    /// Selector for each course row in the overview report
    #[serde(default = "defaults::overview_row")]
    pub overview_row: String,

    /// Class marking placeholder rows in the overview report
    #[serde(default = "defaults::empty_row_class")]
    pub empty_row_class: String,

    /// Selector for the course link within an overview row
    #[serde(default = "defaults::overview_link")]
    pub overview_link: String,

    /// HTML attribute name for extracting links (usually "href")
    #[serde(default = "defaults::attr_name")]
    pub attr_name: String,

    /// Selector for the course title on a course grade page
    #[serde(default = "defaults::course_title")]
    pub course_title: String,

    /// Selector for each graded item row on a course grade page
    #[serde(default = "defaults::grade_row")]
    pub grade_row: String,

    /// Selector marking category aggregation rows to skip
    #[serde(default = "defaults::aggregation_marker")]
    pub aggregation_marker: String,

    /// Selector for the element holding the item name within a row
    #[serde(default = "defaults::item_title")]
    pub item_title: String,

    /// Selector for value cells within a row
    #[serde(default = "defaults::cell")]
    pub cell: String,
}

impl Default for GradeSelectors {
    fn default() -> Self {
        Self {
            overview_row: defaults::overview_row(),
            empty_row_class: defaults::empty_row_class(),
            overview_link: defaults::overview_link(),
            attr_name: defaults::attr_name(),
            course_title: defaults::course_title(),
            grade_row: defaults::grade_row(),
            aggregation_marker: defaults::aggregation_marker(),
            item_title: defaults::item_title(),
            cell: defaults::cell(),
        }
    }
}

mod defaults {
    pub fn overview_row() -> String {
        "table#overview-grade tbody tr".into()
    }
    pub fn empty_row_class() -> String {
        "emptyrow".into()
    }
    pub fn overview_link() -> String {
        "td.c0 a".into()
    }
    pub fn attr_name() -> String {
        "href".into()
    }
    pub fn course_title() -> String {
        "div.page-header-headings h1".into()
    }
    pub fn grade_row() -> String {
        "table.user-grade tbody tr".into()
    }
    pub fn aggregation_marker() -> String {
        "span[title='Aggregation']".into()
    }
    pub fn item_title() -> String {
        "th div.rowtitle".into()
    }
    pub fn cell() -> String {
        "td".into()
    }
}
