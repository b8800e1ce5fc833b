// src/models/mod.rs

//! Domain models for the grade synchronizer.

mod change;
mod config;
pub(crate) mod grade;
mod selectors;

// Re-export all public types
pub use change::Change;
pub use config::{
    Config, HttpConfig, LoginConfig, MoodleConfig, PASSWORD_ENV, StorageConfig, SyncConfig,
    USERNAME_ENV,
};
pub use grade::{GRADE_ROW_SCHEMA, GradeRow, RecordSchema};
pub use selectors::GradeSelectors;

/// A course link discovered on the overview page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseLink {
    /// Display title from the overview report
    pub title: String,
    /// Absolute URL of the course grade page
    pub url: url::Url,
}

/// Course name and rows extracted from one course grade page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCourse {
    pub name: String,
    pub rows: Vec<GradeRow>,
}
