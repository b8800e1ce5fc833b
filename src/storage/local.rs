//! Local filesystem snapshot store.
//!
//! Each course is stored as `{root}/{sanitized name}_grades.csv`. The first
//! line carries the schema header, followed by one delimited record per row.
//! Files are replaced through a temporary file and a rename, so a crash
//! mid-write leaves the previous snapshot intact.
//!
//! Files without a header predate the schema line. They were written with
//! either the configured delimiter or a plain comma and are read with both.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::record::{decode_records, encode_records};
use super::{SnapshotStore, sanitize_entity_name};
use crate::error::{AppError, Result, SnapshotError};
use crate::models::{GRADE_ROW_SCHEMA, GradeRow, RecordSchema};

/// File name suffix of every snapshot.
const SNAPSHOT_SUFFIX: &str = "_grades.csv";

/// Delimiter of headerless snapshots written before the schema line existed.
const LEGACY_DELIMITER: u8 = b',';

/// Distinguishes temporary files of concurrent writes within the process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Local filesystem snapshot backend.
#[derive(Debug, Clone)]
pub struct LocalSnapshotStore {
    root_dir: PathBuf,
    delimiter: u8,
    schema: RecordSchema,
}

impl LocalSnapshotStore {
    /// Create a store rooted at the given directory using `;` as delimiter.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::with_delimiter(root_dir, b';')
    }

    /// Create a store with a custom single-byte field delimiter.
    pub fn with_delimiter(root_dir: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            root_dir: root_dir.into(),
            delimiter,
            schema: GRADE_ROW_SCHEMA,
        }
    }

    /// Full path of the snapshot file for a course.
    fn path(&self, entity: &str) -> PathBuf {
        self.root_dir
            .join(format!("{}{}", sanitize_entity_name(entity), SNAPSHOT_SUFFIX))
    }

    /// Unique sibling path for staging a write.
    fn tmp_path(&self) -> PathBuf {
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.root_dir
            .join(format!(".snapshot-{}-{}.tmp", std::process::id(), seq))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let tmp = self.tmp_path();
        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, path).await
        }
        .await;

        if written.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        written
    }

    fn encode(&self, rows: &[GradeRow]) -> std::io::Result<Vec<u8>> {
        let mut out = self.schema.header().into_bytes();
        out.push(b'\n');
        out.extend(encode_records(
            rows.iter().map(GradeRow::as_record),
            self.delimiter,
        )?);
        Ok(out)
    }

    fn decode(&self, entity: &str, text: &str) -> Result<Vec<GradeRow>> {
        if text.starts_with("#schema=") {
            let (header, body) = text.split_once('\n').unwrap_or((text, ""));
            if !self.schema.accepts_header(header) {
                return Err(SnapshotError::SchemaMismatch {
                    entity: entity.to_string(),
                    found: header.trim().to_string(),
                }
                .into());
            }
            return Ok(self.rows_from(entity, body, self.delimiter));
        }

        let rows = self.rows_from(entity, text, self.delimiter);
        if !rows.is_empty() || self.delimiter == LEGACY_DELIMITER || text.trim().is_empty() {
            return Ok(rows);
        }
        log::debug!(
            "Snapshot '{}' has no header and no valid rows; retrying with ','",
            entity
        );
        Ok(self.rows_from(entity, text, LEGACY_DELIMITER))
    }

    /// Rows of `body` split on `delimiter`. Records of the wrong shape are
    /// skipped.
    fn rows_from(&self, entity: &str, body: &str, delimiter: u8) -> Vec<GradeRow> {
        let mut rows = Vec::new();
        for record in decode_records(body, delimiter) {
            let arity = record.len();
            match GradeRow::from_raw(record) {
                Some(row) => rows.push(row),
                None => log::warn!(
                    "Skipping malformed record in snapshot '{}' ({} fields, expected {})",
                    entity,
                    arity,
                    self.schema.arity()
                ),
            }
        }
        rows
    }
}

#[async_trait]
impl SnapshotStore for LocalSnapshotStore {
    async fn put(&self, entity: &str, rows: &[GradeRow]) -> Result<()> {
        let path = self.path(entity);
        log::debug!("Writing {} rows to {}", rows.len(), path.display());

        let written = match self.encode(rows) {
            Ok(bytes) => self.write_bytes(&path, &bytes).await,
            Err(e) => Err(e),
        };
        written.map_err(|source| {
            SnapshotError::Io {
                entity: entity.to_string(),
                source,
            }
            .into()
        })
    }

    async fn get(&self, entity: &str) -> Result<Vec<GradeRow>> {
        let path = self.path(entity);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound {
                    entity: entity.to_string(),
                }
                .into());
            }
            Err(source) => {
                return Err(SnapshotError::Io {
                    entity: entity.to_string(),
                    source,
                }
                .into());
            }
        };

        self.decode(entity, &text)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(SNAPSHOT_SUFFIX)) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
