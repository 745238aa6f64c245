//! Audience-pool operations exposed to the foreground.

use std::path::Path;

use crate::db::AudienceIdentifier;
use crate::error::Result;
use crate::types::{AudienceRun, GroupName, PoolStats};

use super::TaskEngine;

impl TaskEngine {
    /// Grow a group's pool; duplicates are ignored. Returns how many were new.
    pub async fn add_identifiers<S: AsRef<str> + Sync>(&self, group: &str, values: &[S]) -> Result<u64> {
        let group = GroupName::parse(group)?;
        self.allocator.add_identifiers(&group, values).await
    }

    /// Take one unused identifier, or fail with `PoolExhausted`
    pub async fn allocate_one(&self, group: &str) -> Result<String> {
        let group = GroupName::parse(group)?;
        self.allocator.allocate_one(&group).await
    }

    /// Identifiers not yet handed out
    pub async fn list_unused_identifiers(&self, group: &str) -> Result<Vec<AudienceIdentifier>> {
        let group = GroupName::parse(group)?;
        self.allocator.list_unused(&group).await
    }

    /// Every identifier in a group's pool
    pub async fn list_all_identifiers(&self, group: &str) -> Result<Vec<AudienceIdentifier>> {
        let group = GroupName::parse(group)?;
        self.allocator.list_all(&group).await
    }

    /// Flag one identifier as used; re-marking is a no-op
    pub async fn mark_identifier_used(&self, group: &str, value: &str) -> Result<()> {
        let group = GroupName::parse(group)?;
        self.allocator.mark_used(&group, value).await
    }

    /// Pool size and unused count
    pub async fn pool_stats(&self, group: &str) -> Result<PoolStats> {
        let group = GroupName::parse(group)?;
        self.allocator.pool_stats(&group).await
    }

    /// Newline-separated list of a group's identifiers
    pub async fn export_audience(&self, group: &str) -> Result<String> {
        let group = GroupName::parse(group)?;
        self.allocator.export(&group).await
    }

    /// Write a group's identifiers to a file, one per line
    pub async fn export_audience_to_file(&self, group: &str, path: &Path) -> Result<usize> {
        let group = GroupName::parse(group)?;
        self.allocator.export_to_file(&group, path).await
    }

    /// Grow a group's pool from a file with one identifier per line
    pub async fn import_audience_file(&self, group: &str, path: &Path) -> Result<u64> {
        let group = GroupName::parse(group)?;
        self.allocator.import_file(&group, path).await
    }

    /// Summaries of past audience-populate runs, newest first
    pub async fn list_audience_runs(&self) -> Result<Vec<AudienceRun>> {
        self.db.list_audience_runs().await
    }
}
