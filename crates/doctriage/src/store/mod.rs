//! Result persistence.
//!
//! [`ResultStore`] is the transactional contract the orchestrator relies
//! on: `save` replaces all rows for a file identity in one transaction
//! (delete-then-insert, never append-only), so re-processing the same
//! content can never accumulate duplicates. [`SqliteStore`] is the bundled
//! implementation; the `Database` handle wraps a single rusqlite connection
//! behind a `Mutex` (fine for SQLite, which serializes writes anyway).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub mod error;
pub mod migrations;
pub mod sqlite;

pub use error::StoreError;
pub use sqlite::SqliteStore;

use crate::adapter::FileKind;

/// One extracted page of a document, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub page_no: u32,
    pub text: String,
    pub confidence: f32,
    /// Which engine produced the text, e.g. "tesseract" or "direct".
    pub engine: String,
}

/// A classification tag with its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTag {
    pub label: String,
    pub confidence: f32,
}

/// A generated description of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub text: String,
    pub confidence: f32,
    pub model: String,
}

/// File-level fields handed to `save`. Identity is the content hash.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub content_hash: String,
    pub file_path: PathBuf,
    pub file_kind: FileKind,
    pub page_count: u32,
    pub needs_review: bool,
}

/// A persisted file record, as returned by lookups.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: i64,
    pub content_hash: String,
    pub file_path: PathBuf,
    pub file_kind: String,
    pub page_count: u32,
    pub needs_review: bool,
    pub analyzed_at: DateTime<Utc>,
}

/// Transactional persistence contract for processing results.
pub trait ResultStore: Send + Sync {
    /// Persists a file's results in a single transaction. Existing page,
    /// tag and description rows for the same file identity are deleted
    /// before the new rows are inserted. Returns the file id.
    fn save(
        &self,
        file: &NewFileRecord,
        pages: &[ExtractedPage],
        tags: &[ScoredTag],
        description: &Description,
    ) -> Result<i64, StoreError>;

    /// Looks up an already-analyzed file by content hash.
    fn find_by_hash(&self, content_hash: &str) -> Result<Option<FileRecord>, StoreError>;
}

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). WAL mode is enabled for concurrent read
/// performance on file-backed databases.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        log::info!("Result store opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut conn)
    }
}

/// Returns the canonical database path: `~/.doctriage/data/doctriage.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".doctriage").join("data").join("doctriage.db"))
}
