//! Shared test helpers for creating TaskEngine instances in tests.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;

use crate::allocator::AudienceSource;
use crate::config::Config;
use crate::engine::TaskEngine;
use crate::error::{DatabaseError, Error, Result};
use crate::registry::StatusPolicy;
use crate::types::{Account, AccountStatus, GroupName};

/// Status policy that always returns the same verdict
pub(crate) struct FixedStatusPolicy(pub(crate) AccountStatus);

#[async_trait]
impl StatusPolicy for FixedStatusPolicy {
    async fn decide(&self, _account: &Account) -> Result<AccountStatus> {
        Ok(self.0)
    }
}

/// Status policy whose backing store is unreachable
pub(crate) struct StoreDownPolicy;

#[async_trait]
impl StatusPolicy for StoreDownPolicy {
    async fn decide(&self, _account: &Account) -> Result<AccountStatus> {
        Err(Error::Database(DatabaseError::ConnectionFailed(
            "status store unreachable".to_string(),
        )))
    }
}

/// Audience source yielding `aud-1`, `aud-2`, ... so every value is new
#[derive(Default)]
pub(crate) struct SequentialAudienceSource {
    next: AtomicU64,
}

#[async_trait]
impl AudienceSource for SequentialAudienceSource {
    async fn source(&self, _group: &GroupName, count: usize) -> Result<Vec<String>> {
        Ok((0..count)
            .map(|_| format!("aud-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1))
            .collect())
    }
}

/// Config with every path inside `dir`
pub(crate) fn test_config(dir: &Path, step_delay: Duration) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("test.db");
    config.persistence.settings_path = dir.join("settings.txt");
    config.tasks.step_delay = step_delay;
    config.tasks.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Helper to create a test TaskEngine with deterministic policies.
/// Returns the engine and the tempdir (which must be kept alive).
pub(crate) async fn create_test_engine() -> (TaskEngine, tempfile::TempDir) {
    create_test_engine_with(
        Duration::from_millis(1),
        Arc::new(FixedStatusPolicy(AccountStatus::Valid)),
        Arc::new(SequentialAudienceSource::default()),
    )
    .await
}

/// Like [`create_test_engine`] with an explicit step delay and policies
pub(crate) async fn create_test_engine_with(
    step_delay: Duration,
    status_policy: Arc<dyn StatusPolicy>,
    audience_source: Arc<dyn AudienceSource>,
) -> (TaskEngine, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path(), step_delay);
    let engine = TaskEngine::with_policies(config, status_policy, audience_source)
        .await
        .unwrap();
    (engine, temp_dir)
}

/// Create `group` and fill it with `count` generated accounts
pub(crate) async fn seed_group(engine: &TaskEngine, group: &str, count: usize) {
    engine.create_group(group).await.unwrap();
    engine.generate_accounts(group, count).await.unwrap();
}
