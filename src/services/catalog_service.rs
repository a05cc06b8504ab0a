//! CatalogService — the image catalog, backed by SQLite for durable rows and
//! a broadcast channel for the change stream.
//!
//! All mutations are single conditional statements (idempotent upsert by key,
//! conditional update, delete) so that concurrent or re-delivered messages
//! referencing the same file name cannot race into lost updates. The change
//! stream is best-effort: it emits insert/remove notifications for committed
//! writes only, and receivers that lag are allowed to drop.

use crate::models::catalog::CatalogEntry;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog entry `{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Row-level change kinds surfaced on the change stream.
///
/// Description updates are deliberately not streamed: only entry lifecycle
/// transitions produce user-visible notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogChangeKind {
    Insert,
    Remove,
}

#[derive(Debug, Clone)]
pub struct CatalogChange {
    pub kind: CatalogChangeKind,
    pub file_name: String,
}

/// Shared handle to the catalog table and its change stream.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<SqlitePool>,
    changes: broadcast::Sender<CatalogChange>,
}

impl CatalogService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self { db, changes }
    }

    /// Apply the embedded schema. Statements are idempotent, so this runs on
    /// every startup.
    pub async fn apply_schema(&self) -> CatalogResult<()> {
        let sql = include_str!("../../migrations/0001_init.sql");
        for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Idempotent upsert keyed by file name: re-processing the same upload
    /// leaves exactly one entry and emits at most one insert change.
    pub async fn put(&self, file_name: &str) -> CatalogResult<()> {
        let result = sqlx::query(
            "INSERT INTO catalog_entries (file_name, upload_time) VALUES (?, ?) \
             ON CONFLICT(file_name) DO NOTHING",
        )
        .bind(file_name)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        if result.rows_affected() > 0 {
            self.emit(CatalogChangeKind::Insert, file_name);
        } else {
            debug!(file_name, "catalog entry already present, put is a no-op");
        }
        Ok(())
    }

    /// Conditional description update. Updating a missing entry is a definite
    /// `NotFound` failure, never an implicit create.
    pub async fn update_description(
        &self,
        file_name: &str,
        description: &str,
    ) -> CatalogResult<()> {
        let result = sqlx::query(
            "UPDATE catalog_entries SET description = ? WHERE file_name = ?",
        )
        .bind(description)
        .bind(file_name)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(file_name.to_string()));
        }
        Ok(())
    }

    /// Delete an entry. Deleting a missing entry is a no-op, so redelivered
    /// removal events are harmless; a remove change is emitted only when a row
    /// was actually deleted.
    pub async fn delete(&self, file_name: &str) -> CatalogResult<()> {
        let result = sqlx::query("DELETE FROM catalog_entries WHERE file_name = ?")
            .bind(file_name)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() > 0 {
            self.emit(CatalogChangeKind::Remove, file_name);
        }
        Ok(())
    }

    pub async fn get(&self, file_name: &str) -> CatalogResult<Option<CatalogEntry>> {
        let entry = sqlx::query_as::<_, CatalogEntry>(
            "SELECT file_name, upload_time, description FROM catalog_entries \
             WHERE file_name = ?",
        )
        .bind(file_name)
        .fetch_optional(&*self.db)
        .await?;
        Ok(entry)
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<CatalogChange> {
        self.changes.subscribe()
    }

    fn emit(&self, kind: CatalogChangeKind, file_name: &str) {
        // Best-effort: send fails only when nobody is subscribed.
        let _ = self.changes.send(CatalogChange {
            kind,
            file_name: file_name.to_string(),
        });
    }
}
