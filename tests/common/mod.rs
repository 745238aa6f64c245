//! Common test utilities for account-tasker integration tests

#[allow(dead_code)]
pub mod assertions;

#[allow(unused_imports)]
pub use assertions::*;

use account_tasker::{Config, TaskEngine};
use std::time::Duration;
use tempfile::TempDir;

/// Create an engine whose database and settings live in a fresh temp dir.
/// The temp dir must be kept alive for the engine's lifetime.
pub async fn create_engine(step_delay: Duration) -> (TaskEngine, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let engine = TaskEngine::new(engine_config(&temp_dir, step_delay))
        .await
        .expect("Failed to create engine");
    (engine, temp_dir)
}

/// Config pointing every path into `temp_dir`
pub fn engine_config(temp_dir: &TempDir, step_delay: Duration) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("accounts.db");
    config.persistence.settings_path = temp_dir.path().join("settings.txt");
    config.tasks.step_delay = step_delay;
    config
}
