//! Task engine facade split into focused submodules.
//!
//! The `TaskEngine` struct and its methods are organized by domain:
//! - [`groups`] - Group create/drop/list with the group-busy guard
//! - [`accounts`] - Account CRUD, import and counters
//! - [`audience`] - Audience pools, export/import and run summaries
//! - [`history`] - Task history queries
//! - [`tasks`] - Starting task invocations and the [`TaskHandle`]
//! - [`control`] - Cancellation and active-task listing
//! - [`config_ops`] - Settings read/update
//! - [`lifecycle`] - Startup reconciliation and shutdown
//! - [`task`] - Per-invocation execution

mod accounts;
mod audience;
mod config_ops;
mod control;
mod groups;
mod history;
mod lifecycle;
mod task;
mod tasks;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use tasks::TaskHandle;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64};

use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::allocator::{AudienceAllocator, AudienceSource, RandomAudienceSource};
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::registry::{AccountRegistry, RandomStatusPolicy, StatusPolicy};
use crate::settings::Settings;
use crate::types::{Event, GroupName, TaskId, TaskKind, TaskStatus};

/// Bookkeeping for one running task invocation
pub(crate) struct ActiveTask {
    pub(crate) kind: TaskKind,
    pub(crate) group: GroupName,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) progress: Arc<task::ProgressCounter>,
    pub(crate) status_rx: watch::Receiver<TaskStatus>,
}

/// Task tracking state
#[derive(Clone)]
pub(crate) struct TaskState {
    /// Running invocations by ID (removed when they reach a terminal state)
    pub(crate) active_tasks: Arc<Mutex<HashMap<TaskId, ActiveTask>>>,
    /// Number of running invocations per group, keyed by [`GroupName::key`]
    ///
    /// Held across a group drop so no task can start against a group that
    /// is being dropped.
    pub(crate) active_groups: Arc<Mutex<HashMap<String, usize>>>,
    /// Source of process-local task IDs
    pub(crate) next_task_id: Arc<AtomicU64>,
    /// Cleared during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl TaskState {
    fn new() -> Self {
        Self {
            active_tasks: Arc::new(Mutex::new(HashMap::new())),
            active_groups: Arc::new(Mutex::new(HashMap::new())),
            next_task_id: Arc::new(AtomicU64::new(0)),
            accepting_new: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Main engine instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct TaskEngine {
    /// Database instance for persistence
    /// Public for integration tests to inspect stored state
    pub db: Arc<Database>,
    /// Account operations and the busy claim
    pub(crate) registry: Arc<AccountRegistry>,
    /// Audience-pool operations and allocation
    pub(crate) allocator: Arc<AudienceAllocator>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration, loaded once at startup
    pub(crate) config: Arc<Config>,
    /// User settings (single writer: the foreground)
    pub(crate) settings: Arc<RwLock<Settings>>,
    /// Task tracking state
    pub(crate) task_state: TaskState,
    /// Whether the previous session ended without a clean shutdown
    pub(crate) unclean_start: bool,
}

impl TaskEngine {
    /// Create an engine with the placeholder policies
    ///
    /// Status checks flip a coin and audience acquisition draws random
    /// numbers. Use [`with_policies`](Self::with_policies) to plug in real ones.
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_policies(
            config,
            Arc::new(RandomStatusPolicy),
            Arc::new(RandomAudienceSource),
        )
        .await
    }

    /// Create an engine with explicit status and audience policies
    ///
    /// This initializes all core components:
    /// - Opens/creates the SQLite database and runs migrations
    /// - Records startup for unclean-shutdown detection
    /// - Loads user settings
    /// - Restores accounts a crashed session left `InProgress`
    pub async fn with_policies(
        config: Config,
        status_policy: Arc<dyn StatusPolicy>,
        audience_source: Arc<dyn AudienceSource>,
    ) -> Result<Self> {
        config.validate()?;

        let db = Database::connect(config.database_path(), config.persistence.busy_timeout).await?;

        let unclean_start = db.was_unclean_shutdown().await?;
        if unclean_start {
            tracing::warn!("Previous session did not shut down cleanly");
        }

        // Mark that we're starting up (for unclean shutdown detection)
        db.set_clean_start().await?;

        let settings = Settings::load(config.settings_path()).await?;

        let (event_tx, _rx) = broadcast::channel(config.tasks.event_buffer);

        let db = Arc::new(db);
        let registry = Arc::new(AccountRegistry::new(db.clone(), status_policy));
        let allocator = Arc::new(AudienceAllocator::new(db.clone(), audience_source));

        let engine = Self {
            db,
            registry,
            allocator,
            event_tx,
            config: Arc::new(config),
            settings: Arc::new(RwLock::new(settings)),
            task_state: TaskState::new(),
            unclean_start,
        };

        if engine.config.tasks.reconcile_on_startup {
            engine.reconcile().await?;
        }

        tracing::info!(
            database = %engine.config.database_path().display(),
            "Task engine started"
        );
        Ok(engine)
    }

    /// Subscribe to engine events
    ///
    /// Each subscriber receives all events independently. A subscriber that
    /// falls more than `event_buffer` events behind receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers
    ///
    /// With no subscribers the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
