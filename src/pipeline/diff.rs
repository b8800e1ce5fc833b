//! Diff calculation between two snapshots of one course.
//!
//! Rows are matched by item name. The output follows the order of the new
//! rows, so it is stable for a given extraction order.

use std::collections::HashMap;

use crate::models::{Change, GradeRow};

/// Compare the previous and current rows of `entity`.
///
/// - name only in `new`: `NewElement`
/// - name in both with a different grade: `Changed`
/// - feedback-only differences and rows missing from `new` are not reported
pub fn compare(entity: &str, old: &[GradeRow], new: &[GradeRow]) -> Vec<Change> {
    // Last row wins if a name repeats.
    let previous: HashMap<&str, &GradeRow> = old.iter().map(|r| (r.name.as_str(), r)).collect();

    new.iter()
        .filter_map(|current| match previous.get(current.name.as_str()) {
            None => Some(Change::NewElement {
                entity: entity.to_string(),
                new: current.clone(),
            }),
            Some(prev) if !prev.same_grade(current) => Some(Change::Changed {
                entity: entity.to_string(),
                old: (*prev).clone(),
                new: current.clone(),
            }),
            Some(_) => None,
        })
        .collect()
}
