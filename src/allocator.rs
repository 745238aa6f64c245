//! Audience allocator: per-group identifier pools with at-most-once hand-out.

use async_trait::async_trait;
use rand::Rng;
use std::path::Path;
use std::sync::Arc;

use crate::db::{AudienceIdentifier, Database};
use crate::error::{Error, Result};
use crate::types::{GroupName, PoolStats};

/// Produces new audience identifiers for a group
#[async_trait]
pub trait AudienceSource: Send + Sync {
    /// Acquire up to `count` identifiers
    ///
    /// Values already in the pool are fine; the allocator deduplicates them.
    async fn source(&self, group: &GroupName, count: usize) -> Result<Vec<String>>;
}

/// Placeholder source: random numbers in `10000..100000`
pub struct RandomAudienceSource;

#[async_trait]
impl AudienceSource for RandomAudienceSource {
    async fn source(&self, _group: &GroupName, count: usize) -> Result<Vec<String>> {
        let mut rng = rand::thread_rng();
        Ok((0..count)
            .map(|_| rng.gen_range(10_000..100_000).to_string())
            .collect())
    }
}

/// Hands out audience identifiers, each at most once
pub struct AudienceAllocator {
    db: Arc<Database>,
    source: Arc<dyn AudienceSource>,
}

impl AudienceAllocator {
    /// Create an allocator over `db` that grows pools from `source`
    pub fn new(db: Arc<Database>, source: Arc<dyn AudienceSource>) -> Self {
        Self { db, source }
    }

    /// Take one unused identifier from the group's pool
    ///
    /// Fails with [`Error::PoolExhausted`] when nothing is left. That is a
    /// recoverable condition: the caller skips the allocation.
    pub async fn allocate_one(&self, group: &GroupName) -> Result<String> {
        match self.db.claim_unused_identifier(group).await? {
            Some(value) => {
                tracing::debug!(group = %group, identifier = %value, "Identifier allocated");
                Ok(value)
            }
            None => Err(Error::PoolExhausted(group.to_string())),
        }
    }

    /// Add one identifier; returns whether it was new
    pub async fn add_identifier(&self, group: &GroupName, value: &str) -> Result<bool> {
        self.db.add_identifier(group, value).await
    }

    /// Grow the pool; values already present are ignored. Returns how many were new.
    pub async fn add_identifiers<S: AsRef<str> + Sync>(&self, group: &GroupName, values: &[S]) -> Result<u64> {
        let added = self.db.add_identifiers(group, values).await?;
        tracing::debug!(group = %group, offered = values.len(), added, "Audience pool grown");
        Ok(added)
    }

    /// Acquire one identifier from the source and add it to the pool
    ///
    /// Returns whether the pool gained a new identifier.
    pub async fn populate_one(&self, group: &GroupName) -> Result<bool> {
        let values = self.source.source(group, 1).await?;
        let added = self.db.add_identifiers(group, &values).await?;
        Ok(added > 0)
    }

    /// Identifiers not yet handed out
    pub async fn list_unused(&self, group: &GroupName) -> Result<Vec<AudienceIdentifier>> {
        self.db.list_unused_identifiers(group).await
    }

    /// Every identifier in the pool
    pub async fn list_all(&self, group: &GroupName) -> Result<Vec<AudienceIdentifier>> {
        self.db.list_all_identifiers(group).await
    }

    /// Flag an identifier as used (no-op if it already is)
    pub async fn mark_used(&self, group: &GroupName, value: &str) -> Result<()> {
        self.db.mark_identifier_used(group, value).await
    }

    /// Pool size and unused count
    pub async fn pool_stats(&self, group: &GroupName) -> Result<PoolStats> {
        self.db.pool_stats(group).await
    }

    /// Newline-separated list of every identifier value
    pub async fn export(&self, group: &GroupName) -> Result<String> {
        let values: Vec<String> = self
            .db
            .list_all_identifiers(group)
            .await?
            .into_iter()
            .map(|id| id.value)
            .collect();
        Ok(values.join("\n"))
    }

    /// Write [`export`](Self::export) output to a file
    pub async fn export_to_file(&self, group: &GroupName, path: &Path) -> Result<usize> {
        let text = self.export(group).await?;
        let count = text.lines().count();
        tokio::fs::write(path, text).await?;
        tracing::info!(group = %group, path = %path.display(), count, "Audience exported");
        Ok(count)
    }

    /// Read one identifier per line and grow the pool with them
    ///
    /// Blank lines are ignored. Returns how many identifiers were new.
    pub async fn import_file(&self, group: &GroupName, path: &Path) -> Result<u64> {
        let text = tokio::fs::read_to_string(path).await?;
        let values: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let added = self.db.add_identifiers(group, &values).await?;
        tracing::info!(group = %group, path = %path.display(), added, "Audience imported");
        Ok(added)
    }
}
