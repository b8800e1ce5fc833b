//! Grade row data structure and its persisted record schema.

use serde::{Deserialize, Serialize};

/// Ordered field layout of a persisted grade record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSchema {
    pub name: &'static str,
    pub version: u32,
    pub fields: &'static [&'static str],
}

/// Current layout, matching the columns of the Moodle user grade report.
pub const GRADE_ROW_SCHEMA: RecordSchema = RecordSchema {
    name: "grade-row",
    version: 1,
    fields: &[
        "name",
        "weight",
        "score",
        "range",
        "percentage",
        "contribution",
        "feedback",
    ],
};

impl RecordSchema {
    /// Number of fields in every record.
    pub const fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Position of a named field.
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| *f == field)
    }

    /// Header line identifying this schema in a snapshot file.
    pub fn header(&self) -> String {
        format!("#schema={}/v{}", self.name, self.version)
    }

    /// Check a header line against this schema.
    pub fn accepts_header(&self, line: &str) -> bool {
        line.trim() == self.header()
    }
}

const NAME: usize = 0;
const SCORE: usize = 2;
const RANGE: usize = 3;
const PERCENTAGE: usize = 4;
const FEEDBACK: usize = 6;

/// One graded item of a course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradeRow {
    /// Item name, unique within a course
    pub name: String,

    /// Display-formatted percentage (e.g. "90.00 %")
    pub percentage: String,

    /// Obtained score
    pub score: String,

    /// Range or maximum, possibly an en-dash span ("0–10")
    pub range: String,

    /// Teacher feedback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,

    /// Fields in schema order, persisted verbatim
    pub raw: Vec<String>,
}

impl GradeRow {
    /// Build a row from fields in [`GRADE_ROW_SCHEMA`] order.
    ///
    /// Returns `None` when the arity is wrong or the name is empty.
    pub fn from_raw(raw: Vec<String>) -> Option<Self> {
        if raw.len() != GRADE_ROW_SCHEMA.arity() || raw[NAME].trim().is_empty() {
            return None;
        }

        let feedback = Some(raw[FEEDBACK].clone()).filter(|f| !f.is_empty());
        Some(Self {
            name: raw[NAME].clone(),
            percentage: raw[PERCENTAGE].clone(),
            score: raw[SCORE].clone(),
            range: raw[RANGE].clone(),
            feedback,
            raw,
        })
    }

    /// Fields in schema order.
    pub fn as_record(&self) -> &[String] {
        &self.raw
    }

    /// Compare only the grade-significant fields.
    ///
    /// Feedback is not part of the comparison.
    pub fn same_grade(&self, other: &GradeRow) -> bool {
        self.name == other.name
            && self.percentage == other.percentage
            && self.score == other.score
            && self.range == other.range
    }

    /// Render the score as `score/max`, taking the upper bound of a range.
    pub fn score_with_slash(&self) -> String {
        let max = match self.range.split_once('–') {
            Some((_, upper)) => strip_spaces(upper),
            None => self.range.clone(),
        };
        format!("{}/{}", self.score, max)
    }

    /// Percentage with inner spaces removed ("90.00 %" -> "90.00%").
    pub fn compact_percentage(&self) -> String {
        strip_spaces(&self.percentage)
    }
}

fn strip_spaces(s: &str) -> String {
    s.replace(' ', "")
}

#[cfg(test)]
pub(crate) fn row(name: &str, percentage: &str, score: &str, range: &str) -> GradeRow {
    row_with_feedback(name, percentage, score, range, "")
}

#[cfg(test)]
pub(crate) fn row_with_feedback(
    name: &str,
    percentage: &str,
    score: &str,
    range: &str,
    feedback: &str,
) -> GradeRow {
    GradeRow::from_raw(vec![
        name.to_string(),
        "10.00 %".to_string(),
        score.to_string(),
        range.to_string(),
        percentage.to_string(),
        "1.00 %".to_string(),
        feedback.to_string(),
    ])
    .unwrap()
}
