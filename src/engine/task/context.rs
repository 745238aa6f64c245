//! Shared state for a single task invocation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::allocator::AudienceAllocator;
use crate::db::Database;
use crate::engine::TaskState;
use crate::registry::AccountRegistry;
use crate::types::{Event, GroupName, TaskId, TaskKind, TaskProgress, TaskStatus};

/// Processed/total counter readable without blocking the runner
#[derive(Debug)]
pub(crate) struct ProgressCounter {
    processed: AtomicU64,
    total: u64,
}

impl ProgressCounter {
    pub(crate) fn new(total: u64) -> Self {
        Self {
            processed: AtomicU64::new(0),
            total,
        }
    }

    /// Count one more processed account, returning the new count
    pub(crate) fn advance(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Count every remaining account as processed, returning how many that was
    pub(crate) fn finish(&self) -> u64 {
        self.total - self.processed.swap(self.total, Ordering::AcqRel).min(self.total)
    }

    pub(crate) fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    pub(crate) fn total(&self) -> u64 {
        self.total
    }

    pub(crate) fn snapshot(&self) -> TaskProgress {
        TaskProgress {
            processed: self.processed(),
            total: self.total,
        }
    }
}

/// Shared context for a single task invocation, reducing parameter passing between helpers.
pub(crate) struct TaskContext {
    pub(crate) id: TaskId,
    pub(crate) kind: TaskKind,
    pub(crate) group: GroupName,
    pub(crate) db: Arc<Database>,
    pub(crate) registry: Arc<AccountRegistry>,
    pub(crate) allocator: Arc<AudienceAllocator>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) progress: Arc<ProgressCounter>,
    pub(crate) status_tx: watch::Sender<TaskStatus>,
    pub(crate) step_delay: Duration,
    pub(crate) task_state: TaskState,
}

impl TaskContext {
    pub(super) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(super) fn set_status(&self, status: TaskStatus) {
        self.status_tx.send_replace(status);
    }

    /// Remove this invocation from the active-task map and release its hold on the group.
    pub(super) async fn remove_from_active(&self) {
        {
            let mut active = self.task_state.active_tasks.lock().await;
            active.remove(&self.id);
        }

        let mut groups = self.task_state.active_groups.lock().await;
        let key = self.group.key();
        let remaining = match groups.get_mut(&key) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            groups.remove(&key);
        }
    }
}
