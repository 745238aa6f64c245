//! Configuration types for account-tasker

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Storage locations and database tuning
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "accounts.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Flat key=value settings file (default: "settings.txt")
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,

    /// How long a writer waits for a competing writer's lock (default: 5 seconds)
    #[serde(default = "default_busy_timeout", with = "duration_secs_serde")]
    pub busy_timeout: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            settings_path: default_settings_path(),
            busy_timeout: default_busy_timeout(),
        }
    }
}

/// Task execution behavior
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Simulated latency of each per-account step (default: 10 ms)
    ///
    /// This is the only intentional suspension point of a step; real
    /// implementations of the policies suspend on I/O here instead.
    #[serde(default = "default_step_delay", with = "duration_millis_serde")]
    pub step_delay: Duration,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Restore accounts left `InProgress` by a crash when the engine starts (default: true)
    #[serde(default = "default_true")]
    pub reconcile_on_startup: bool,

    /// How long shutdown waits for active tasks before giving up (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_secs_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            step_delay: default_step_delay(),
            event_buffer: default_event_buffer(),
            reconcile_on_startup: true,
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Main configuration for [`TaskEngine`](crate::TaskEngine)
///
/// Loaded once at process start and shared as `Arc<Config>`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage locations and database tuning
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Task execution behavior
    #[serde(default)]
    pub tasks: TaskConfig,
}

impl Config {
    /// Load configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot reject on its own
    pub fn validate(&self) -> Result<()> {
        if self.tasks.event_buffer == 0 {
            return Err(Error::Config {
                message: "event_buffer must be greater than zero".to_string(),
                key: Some("event_buffer".to_string()),
            });
        }
        if self.persistence.database_path.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "database_path must not be empty".to_string(),
                key: Some("database_path".to_string()),
            });
        }
        Ok(())
    }

    /// Database path
    pub fn database_path(&self) -> &PathBuf {
        &self.persistence.database_path
    }

    /// Settings file path
    pub fn settings_path(&self) -> &PathBuf {
        &self.persistence.settings_path
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("accounts.db")
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("settings.txt")
}

fn default_busy_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_step_delay() -> Duration {
    Duration::from_millis(10)
}

fn default_event_buffer() -> usize {
    1000
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

mod duration_secs_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
