//! Snapshot persistence for course grade rows.
//!
//! One snapshot per course holds the rows seen on the last successful sync.
//! Snapshots are overwritten wholesale and never partially updated.
//!
//! ## Directory Structure
//!
//! ```text
//! csvs/
//! ├── Calculus I_grades.csv
//! └── Physics_ Mechanics_grades.csv
//! ```

pub mod local;
pub mod record;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::GradeRow;

// Re-export for convenience
pub use local::LocalSnapshotStore;

/// Characters that cannot appear in a snapshot file name.
const INVALID_FILENAME_CHARS: [char; 9] = [':', '/', '\\', '*', '?', '"', '<', '>', '|'];

/// Maximum length in bytes of a sanitized course name. Leaves room for the
/// `_grades.csv.tmp` suffix within a 255-byte file name.
pub const MAX_ENTITY_NAME_LEN: usize = 240;

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the snapshot for `entity` with `rows`.
    async fn put(&self, entity: &str, rows: &[GradeRow]) -> Result<()>;

    /// Load the snapshot for `entity`.
    ///
    /// A course that was never synced yields `SnapshotError::NotFound`.
    async fn get(&self, entity: &str) -> Result<Vec<GradeRow>>;

    /// List the keys of all stored snapshots.
    async fn list(&self) -> Result<Vec<String>>;
}

/// Turn a course name into a safe snapshot key.
pub fn sanitize_entity_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if INVALID_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim();
    if trimmed.len() <= MAX_ENTITY_NAME_LEN {
        return trimmed.to_string();
    }

    let mut end = MAX_ENTITY_NAME_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
