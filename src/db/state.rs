//! Runtime state tracking: clean-shutdown detection.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::Database;

const CLEAN_SHUTDOWN_KEY: &str = "clean_shutdown";

impl Database {
    /// Check if the last shutdown was unclean
    ///
    /// Returns true if a previous session started but never reached
    /// [`set_clean_shutdown`](Self::set_clean_shutdown), i.e. it crashed or was
    /// killed, and accounts may have been left `InProgress`. A database no
    /// session has started on yet is clean.
    pub async fn was_unclean_shutdown(&self) -> Result<bool> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM runtime_state WHERE key = ?")
                .bind(CLEAN_SHUTDOWN_KEY)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to check shutdown state: {}",
                        e
                    )))
                })?;

        Ok(value.is_some_and(|v| v != "true"))
    }

    /// Mark that the engine has started
    pub async fn set_clean_start(&self) -> Result<()> {
        self.set_shutdown_flag("false").await
    }

    /// Mark that the engine is shutting down cleanly
    pub async fn set_clean_shutdown(&self) -> Result<()> {
        self.set_shutdown_flag("true").await
    }

    async fn set_shutdown_flag(&self, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO runtime_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(CLEAN_SHUTDOWN_KEY)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record shutdown state: {}",
                e
            )))
        })?;

        Ok(())
    }
}
