//! Task history queries.

use crate::error::{Error, Result};
use crate::types::HistoryEntry;

use super::TaskEngine;

impl TaskEngine {
    /// Page through task history, newest first
    pub async fn list_history(&self, limit: usize, offset: usize) -> Result<Vec<HistoryEntry>> {
        self.db.query_history(limit, offset).await
    }

    /// Total number of history entries
    pub async fn count_history(&self) -> Result<u64> {
        Ok(self.db.count_history().await?.max(0) as u64)
    }

    /// One history entry, or `NotFound`
    pub async fn get_history_entry(&self, id: i64) -> Result<HistoryEntry> {
        self.db
            .get_history_entry(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("history entry {}", id)))
    }
}
