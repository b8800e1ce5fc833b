//! Change events produced by a sync run.

use std::fmt;

use serde::Serialize;

use super::GradeRow;

/// A newly observed or modified grade item.
///
/// Removed items are never reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    NewElement {
        entity: String,
        new: GradeRow,
    },
    Changed {
        entity: String,
        old: GradeRow,
        new: GradeRow,
    },
}

impl Change {
    /// Course the change belongs to.
    pub fn entity(&self) -> &str {
        match self {
            Change::NewElement { entity, .. } | Change::Changed { entity, .. } => entity,
        }
    }

    /// The row as currently observed.
    pub fn new_row(&self) -> &GradeRow {
        match self {
            Change::NewElement { new, .. } | Change::Changed { new, .. } => new,
        }
    }

    /// The previously persisted row, if the item existed before.
    pub fn old_row(&self) -> Option<&GradeRow> {
        match self {
            Change::NewElement { .. } => None,
            Change::Changed { old, .. } => Some(old),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::NewElement { entity, new } => write!(
                f,
                "{}: New {} {} ({})",
                entity,
                new.name,
                new.compact_percentage(),
                new.score_with_slash()
            ),
            Change::Changed { entity, old, new } => write!(
                f,
                "{}: Changed {} {} ({}) -> {} ({})",
                entity,
                new.name,
                old.compact_percentage(),
                old.score_with_slash(),
                new.compact_percentage(),
                new.score_with_slash()
            ),
        }
    }
}
