// src/services/extractor.rs

//! Grade page extraction.
//!
//! Turns raw page bytes into course links (overview report) or a course
//! name plus grade rows (user report) using configured CSS selectors.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CourseLink, ExtractedCourse, GRADE_ROW_SCHEMA, GradeRow, GradeSelectors};
use crate::utils::{clean_text, resolve_url};

/// Page-structure specific scraping rules.
pub trait GradeExtractor: Send + Sync {
    /// List course links on the overview page.
    fn extract_links(&self, page: &[u8], base: &Url) -> Result<Vec<CourseLink>>;

    /// Extract the course name and its grade rows.
    fn extract_course(&self, page: &[u8]) -> Result<ExtractedCourse>;
}

/// Extractor for the stock Moodle overview and user grade reports.
#[derive(Debug)]
pub struct MoodleExtractor {
    overview_row: Selector,
    overview_link: Selector,
    course_title: Selector,
    grade_row: Selector,
    aggregation_marker: Selector,
    item_title: Selector,
    cell: Selector,
    empty_row_class: String,
    attr_name: String,
}

impl MoodleExtractor {
    /// Compile the configured selectors.
    pub fn new(selectors: &GradeSelectors) -> Result<Self> {
        Ok(Self {
            overview_row: Self::parse_selector(&selectors.overview_row)?,
            overview_link: Self::parse_selector(&selectors.overview_link)?,
            course_title: Self::parse_selector(&selectors.course_title)?,
            grade_row: Self::parse_selector(&selectors.grade_row)?,
            aggregation_marker: Self::parse_selector(&selectors.aggregation_marker)?,
            item_title: Self::parse_selector(&selectors.item_title)?,
            cell: Self::parse_selector(&selectors.cell)?,
            empty_row_class: selectors.empty_row_class.clone(),
            attr_name: selectors.attr_name.clone(),
        })
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }

    /// Name of a graded item: the first element inside the row title.
    fn item_name(&self, row: &ElementRef) -> Option<String> {
        let title = row.select(&self.item_title).next()?;
        let name = title
            .children()
            .filter_map(ElementRef::wrap)
            .next()
            .map(|el| clean_text(&el.text().collect::<String>()))
            .unwrap_or_else(|| clean_text(&title.text().collect::<String>()));

        Some(name).filter(|n| !n.is_empty())
    }
}

/// First non-empty descendant text node, whitespace-normalized.
fn first_text(element: &ElementRef) -> String {
    element
        .text()
        .map(clean_text)
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

impl GradeExtractor for MoodleExtractor {
    fn extract_links(&self, page: &[u8], base: &Url) -> Result<Vec<CourseLink>> {
        let document = Html::parse_document(&String::from_utf8_lossy(page));

        let mut seen_rows = 0;
        let mut links = Vec::new();
        for row in document.select(&self.overview_row) {
            seen_rows += 1;
            if row.value().classes().any(|c| c == self.empty_row_class) {
                continue;
            }

            let Some(anchor) = row.select(&self.overview_link).next() else {
                continue;
            };
            let Some(href) = anchor.value().attr(&self.attr_name) else {
                continue;
            };
            let Some(url) = resolve_url(base, href) else {
                log::warn!("Skipping course link with invalid URL: {}", href);
                continue;
            };

            links.push(CourseLink {
                title: clean_text(&anchor.text().collect::<String>()),
                url,
            });
        }

        if seen_rows == 0 {
            return Err(AppError::extraction("overview report table not found"));
        }
        Ok(links)
    }

    fn extract_course(&self, page: &[u8]) -> Result<ExtractedCourse> {
        let document = Html::parse_document(&String::from_utf8_lossy(page));

        let name = document
            .select(&self.course_title)
            .next()
            .map(|h| clean_text(&h.text().collect::<String>()))
            .unwrap_or_default();
        if name.is_empty() {
            return Err(AppError::extraction("failed to extract course name"));
        }

        let mut rows = Vec::new();
        for tr in document.select(&self.grade_row) {
            if tr.select(&self.aggregation_marker).next().is_some() {
                continue;
            }
            let Some(item) = self.item_name(&tr) else {
                continue;
            };

            let mut raw = vec![item];
            raw.extend(tr.select(&self.cell).map(|td| first_text(&td)));

            let arity = raw.len();
            match GradeRow::from_raw(raw) {
                Some(row) => rows.push(row),
                None => log::debug!(
                    "Skipping row in '{}' with {} fields (expected {})",
                    name,
                    arity,
                    GRADE_ROW_SCHEMA.arity()
                ),
            }
        }

        Ok(ExtractedCourse { name, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{self, url};

    fn extractor() -> MoodleExtractor {
        MoodleExtractor::new(&GradeSelectors::default()).unwrap()
    }

    #[test]
    fn test_parse_selector_invalid() {
        let mut selectors = GradeSelectors::default();
        selectors.grade_row = "[[invalid".to_string();
        assert!(matches!(
            MoodleExtractor::new(&selectors),
            Err(AppError::Selector { .. })
        ));
    }

    #[test]
    fn extracts_overview_links_and_skips_empty_rows() {
        let html = testing::overview_page(&[
            ("Calculus I", "../user/index.php?id=1"),
            ("Physics", "https://lms.test/grade/report/user/index.php?id=2"),
        ]);

        let links = extractor()
            .extract_links(html.as_bytes(), &url(testing::OVERVIEW))
            .unwrap();

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].title, "Calculus I");
        assert_eq!(
            links[0].url.as_str(),
            "https://lms.test/grade/report/user/index.php?id=1"
        );
        assert_eq!(links[1].title, "Physics");
    }

    #[test]
    fn overview_without_report_table_is_an_error() {
        let err = extractor()
            .extract_links(b"<html><body>Log in</body></html>", &url(testing::OVERVIEW))
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
    }

    #[test]
    fn extracts_course_rows_skipping_aggregations() {
        let html = testing::course_page(
            "Calculus I",
            &[
                ("HW1", "8.00", "80.00 %", ""),
                ("Midterm", "9.50", "95.00 %", "Excellent work"),
            ],
        );

        let course = extractor().extract_course(html.as_bytes()).unwrap();

        assert_eq!(course.name, "Calculus I");
        assert_eq!(course.rows.len(), 2);

        let hw1 = &course.rows[0];
        assert_eq!(hw1.name, "HW1");
        assert_eq!(hw1.score, "8.00");
        assert_eq!(hw1.range, "0–10");
        assert_eq!(hw1.percentage, "80.00 %");
        assert_eq!(hw1.feedback, None);

        assert_eq!(course.rows[1].feedback.as_deref(), Some("Excellent work"));
        assert_eq!(course.rows[1].raw.len(), GRADE_ROW_SCHEMA.arity());
    }

    #[test]
    fn course_without_title_is_an_error() {
        let err = extractor()
            .extract_course(b"<table class=\"user-grade\"></table>")
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
    }

    #[test]
    fn rows_with_wrong_arity_are_dropped() {
        let html = r#"<div class="page-header-headings"><h1>Short</h1></div>
            <table class="user-grade"><tbody>
            <tr><th><div class="rowtitle"><a>HW1</a></div></th><td>1</td><td>2</td></tr>
            </tbody></table>"#;

        let course = extractor().extract_course(html.as_bytes()).unwrap();
        assert_eq!(course.name, "Short");
        assert!(course.rows.is_empty());
    }
}
