//! Task history operations.

use crate::types::HistoryEntry;
use crate::{Error, Result};

use super::{Database, HistoryRow, NewHistoryEntry};

const HISTORY_COLUMNS: &str =
    "id, task_kind, group_name, started_at, duration_ms, status, reason, processed, total";

impl Database {
    /// Append a task invocation to history
    ///
    /// History rows are never updated after this call.
    pub async fn insert_history(&self, entry: &NewHistoryEntry) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO history (
                task_kind, group_name, started_at, duration_ms,
                status, reason, processed, total
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.kind.as_db())
        .bind(&entry.group)
        .bind(entry.started_at_ms)
        .bind(entry.duration_ms)
        .bind(entry.status.as_db())
        .bind(entry.status.reason())
        .bind(entry.processed as i64)
        .bind(entry.total as i64)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(result.last_insert_rowid())
    }

    /// Query history with pagination
    ///
    /// Returns entries newest first.
    pub async fn query_history(&self, limit: usize, offset: usize) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {} FROM history ORDER BY started_at DESC, id DESC LIMIT ? OFFSET ?",
            HISTORY_COLUMNS
        ))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    /// Count history entries
    pub async fn count_history(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM history")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Sqlx)?;

        Ok(count)
    }

    /// Get a single history entry by ID
    pub async fn get_history_entry(&self, id: i64) -> Result<Option<HistoryEntry>> {
        let row = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {} FROM history WHERE id = ?",
            HISTORY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(row.map(HistoryEntry::from))
    }
}
