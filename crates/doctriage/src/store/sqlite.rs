//! SQLite-backed [`ResultStore`] implementation.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Row};

use super::{
    Database, Description, ExtractedPage, FileRecord, NewFileRecord, ResultStore, ScoredTag,
    StoreError,
};

#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    /// In-memory store for tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            db: Database::open_in_memory()?,
        })
    }

    fn record_from_row(row: &Row<'_>) -> Result<FileRecord, rusqlite::Error> {
        let analyzed_at: String = row.get("analyzed_at")?;
        let file_path: String = row.get("file_path")?;
        Ok(FileRecord {
            id: row.get("id")?,
            content_hash: row.get("content_hash")?,
            file_path: PathBuf::from(file_path),
            file_kind: row.get("file_kind")?,
            page_count: row.get("page_count")?,
            needs_review: row.get("needs_review")?,
            analyzed_at: analyzed_at
                .parse()
                .unwrap_or_else(|_| chrono::DateTime::<Utc>::MIN_UTC),
        })
    }

    /// Lists files flagged for human review, newest first.
    pub fn list_needing_review(&self) -> Result<Vec<FileRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM files WHERE needs_review = 1 ORDER BY analyzed_at DESC",
            )?;
            let records = stmt
                .query_map([], Self::record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
    }

    /// Total number of persisted file records.
    pub fn count_records(&self) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let count: u64 = conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
            Ok(count)
        })
    }

    /// Row counts for a file's children, in (pages, tags, descriptions)
    /// order. Used by retry-cleanliness checks.
    pub fn count_children(&self, file_id: i64) -> Result<(u64, u64, u64), StoreError> {
        self.db.with_conn(|conn| {
            let pages: u64 = conn.query_row(
                "SELECT COUNT(*) FROM pages WHERE file_id = ?1",
                params![file_id],
                |r| r.get(0),
            )?;
            let tags: u64 = conn.query_row(
                "SELECT COUNT(*) FROM tags WHERE file_id = ?1",
                params![file_id],
                |r| r.get(0),
            )?;
            let descriptions: u64 = conn.query_row(
                "SELECT COUNT(*) FROM descriptions WHERE file_id = ?1",
                params![file_id],
                |r| r.get(0),
            )?;
            Ok((pages, tags, descriptions))
        })
    }

    /// Tag labels for a file, in persisted position order.
    pub fn tags_for(&self, file_id: i64) -> Result<Vec<String>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT label FROM tags WHERE file_id = ?1 ORDER BY position")?;
            let labels = stmt
                .query_map(params![file_id], |r| r.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(labels)
        })
    }
}

impl ResultStore for SqliteStore {
    fn save(
        &self,
        file: &NewFileRecord,
        pages: &[ExtractedPage],
        tags: &[ScoredTag],
        description: &Description,
    ) -> Result<i64, StoreError> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM files WHERE content_hash = ?1",
                    params![file.content_hash],
                    |r| r.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            let analyzed_at = Utc::now().to_rfc3339();
            let file_path = file.file_path.to_string_lossy();

            let file_id = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE files SET file_path=?2, file_kind=?3, page_count=?4,
                         needs_review=?5, analyzed_at=?6 WHERE id=?1",
                        params![
                            id,
                            file_path,
                            file.file_kind.as_str(),
                            file.page_count,
                            file.needs_review,
                            analyzed_at,
                        ],
                    )?;
                    id
                }
                None => {
                    tx.execute(
                        "INSERT INTO files (content_hash, file_path, file_kind, page_count,
                         needs_review, analyzed_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            file.content_hash,
                            file_path,
                            file.file_kind.as_str(),
                            file.page_count,
                            file.needs_review,
                            analyzed_at,
                        ],
                    )?;
                    tx.last_insert_rowid()
                }
            };

            // Delete-then-insert: a retried save must leave exactly the new
            // rows behind, never the union of old and new.
            tx.execute("DELETE FROM pages WHERE file_id = ?1", params![file_id])?;
            tx.execute("DELETE FROM tags WHERE file_id = ?1", params![file_id])?;
            tx.execute(
                "DELETE FROM descriptions WHERE file_id = ?1",
                params![file_id],
            )?;

            for page in pages {
                tx.execute(
                    "INSERT INTO pages (file_id, page_no, text, confidence, engine)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![file_id, page.page_no, page.text, page.confidence, page.engine],
                )?;
            }

            for (position, tag) in tags.iter().enumerate() {
                tx.execute(
                    "INSERT INTO tags (file_id, position, label, confidence)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![file_id, position as i64, tag.label, tag.confidence],
                )?;
            }

            tx.execute(
                "INSERT INTO descriptions (file_id, text, confidence, model)
                 VALUES (?1, ?2, ?3, ?4)",
                params![file_id, description.text, description.confidence, description.model],
            )?;

            tx.commit()?;
            Ok(file_id)
        })
    }

    fn find_by_hash(&self, content_hash: &str) -> Result<Option<FileRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM files WHERE content_hash = ?1")?;
            let mut rows = stmt.query_map(params![content_hash], Self::record_from_row)?;
            match rows.next() {
                Some(Ok(record)) => Ok(Some(record)),
                Some(Err(e)) => Err(StoreError::Sqlite(e)),
                None => Ok(None),
            }
        })
    }
}
