//! Persistent document records and uploaded-file storage.
//!
//! The store keeps one SQLite row per uploaded document plus the file bytes
//! under the media root. The file is written at creation and never mutated;
//! only the `summary` column changes afterwards. Deletion is used both for
//! explicit removal and as the compensating action when summarization fails
//! after the record was created.

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

/// Errors raised by the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The upload payload was missing or malformed.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
    /// No document exists with the requested identifier.
    #[error("Document not found.")]
    NotFound,
    /// The database rejected the operation.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// The media file could not be written or removed.
    #[error("File storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// A persisted document record.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Document {
    /// Row identifier assigned by the database.
    pub id: i64,
    /// Path of the stored file, relative to the media root.
    #[serde(rename = "file")]
    pub file_path: String,
    /// Generated summary, absent until the first successful summarization.
    pub summary: Option<String>,
    /// RFC3339 creation timestamp.
    pub uploaded_at: String,
}

/// SQLite-backed store for documents and their uploaded files.
#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
    media_root: PathBuf,
}

impl DocumentStore {
    /// Open (creating if necessary) the database and media directory.
    pub async fn connect(db_path: &Path, media_root: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(media_root.join("documents"))?;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(StoreError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path TEXT NOT NULL,
                summary TEXT,
                uploaded_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            media_root: media_root.to_path_buf(),
        })
    }

    /// Validate and persist an uploaded file, creating its document record.
    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<Document, StoreError> {
        if bytes.is_empty() {
            return Err(StoreError::InvalidUpload("file payload is empty".into()));
        }
        let sanitized = sanitize_file_name(file_name);
        if !sanitized.to_ascii_lowercase().ends_with(".pdf") {
            return Err(StoreError::InvalidUpload(format!(
                "expected a .pdf file, got '{file_name}'"
            )));
        }

        let stored_name = format!("{}-{}", &Uuid::new_v4().simple().to_string()[..8], sanitized);
        let relative = format!("documents/{stored_name}");
        let absolute = self.media_root.join(&relative);
        std::fs::write(&absolute, bytes)?;

        let uploaded_at = current_timestamp_rfc3339();
        let insert = sqlx::query(
            "INSERT INTO documents (file_path, summary, uploaded_at) VALUES (?, NULL, ?)",
        )
        .bind(&relative)
        .bind(&uploaded_at)
        .execute(&self.pool)
        .await;

        let result = match insert {
            Ok(result) => result,
            Err(err) => {
                // Do not leave an orphaned file behind when the row insert fails.
                if let Err(cleanup_err) = std::fs::remove_file(&absolute) {
                    tracing::warn!(path = %absolute.display(), error = %cleanup_err, "Failed to remove file after insert error");
                }
                return Err(err.into());
            }
        };

        let id = result.last_insert_rowid();
        tracing::info!(id, file = %relative, "Document saved");
        Ok(Document {
            id,
            file_path: relative,
            summary: None,
            uploaded_at,
        })
    }

    /// Fetch a document by identifier.
    pub async fn get(&self, id: i64) -> Result<Document, StoreError> {
        sqlx::query_as::<_, Document>(
            "SELECT id, file_path, summary, uploaded_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    /// Overwrite the stored summary (idempotent).
    pub async fn update_summary(&self, id: i64, summary: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE documents SET summary = ? WHERE id = ?")
            .bind(summary)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Remove a document record and its stored file.
    pub async fn delete(&self, doc: &Document) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(doc.id)
            .execute(&self.pool)
            .await?;
        let absolute = self.media_root.join(&doc.file_path);
        if absolute.exists() {
            std::fs::remove_file(&absolute)?;
        }
        Ok(())
    }

    /// Best-effort delete used on compensation paths; never surfaces an error.
    pub async fn delete_silently(&self, doc: &Document) {
        if let Err(err) = self.delete(doc).await {
            tracing::warn!(id = doc.id, error = %err, "Failed to delete document during cleanup");
        }
    }

    /// Number of stored documents.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Resolve the absolute on-disk path for a document's stored file.
    pub fn absolute_path(&self, doc: &Document) -> PathBuf {
        self.media_root.join(&doc.file_path)
    }
}

/// Current UTC time formatted as RFC3339.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

/// Strip path separators and shell-unfriendly characters from an upload name.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store(dir: &TempDir) -> DocumentStore {
        DocumentStore::connect(&dir.path().join("test.db"), &dir.path().join("media"))
            .await
            .expect("store connects")
    }

    #[tokio::test]
    async fn save_persists_file_and_record() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let doc = store.save("report.pdf", b"%PDF-1.4 fake").await.unwrap();
        assert!(doc.file_path.starts_with("documents/"));
        assert!(doc.file_path.ends_with("report.pdf"));
        assert!(doc.summary.is_none());
        assert!(store.absolute_path(&doc).exists());

        let fetched = store.get(doc.id).await.unwrap();
        assert_eq!(fetched.file_path, doc.file_path);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn save_rejects_empty_payload_and_wrong_extension() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;

        let empty = store.save("report.pdf", b"").await.unwrap_err();
        assert!(matches!(empty, StoreError::InvalidUpload(_)));

        let wrong = store.save("notes.txt", b"hello").await.unwrap_err();
        assert!(matches!(wrong, StoreError::InvalidUpload(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;
        let error = store.get(99).await.unwrap_err();
        assert!(matches!(error, StoreError::NotFound));
    }

    #[tokio::test]
    async fn update_summary_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;
        let doc = store.save("paper.pdf", b"%PDF-1.4").await.unwrap();

        store.update_summary(doc.id, "A summary.").await.unwrap();
        store.update_summary(doc.id, "A summary.").await.unwrap();

        let fetched = store.get(doc.id).await.unwrap();
        assert_eq!(fetched.summary.as_deref(), Some("A summary."));
    }

    #[tokio::test]
    async fn delete_removes_row_and_file() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;
        let doc = store.save("gone.pdf", b"%PDF-1.4").await.unwrap();
        let path = store.absolute_path(&doc);

        store.delete(&doc).await.unwrap();
        assert!(!path.exists());
        assert!(matches!(store.get(doc.id).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn delete_silently_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir).await;
        let doc = store.save("twice.pdf", b"%PDF-1.4").await.unwrap();
        store.delete(&doc).await.unwrap();
        // Second delete has nothing to remove; must not panic or error out.
        store.delete_silently(&doc).await;
    }

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_file_name("../../etc/passwd.pdf"), "passwd.pdf");
        assert_eq!(sanitize_file_name("my report (v2).pdf"), "my_report__v2_.pdf");
    }
}
