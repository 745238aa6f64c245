//! Startup reconciliation and shutdown coordination.

use std::sync::atomic::Ordering;

use futures::future::join_all;

use crate::error::Result;
use crate::types::{Event, TaskStatus};

use super::TaskEngine;

impl TaskEngine {
    /// Restore accounts a previous session left `InProgress`
    ///
    /// Each one gets back the status it had before it was claimed. Returns
    /// the number of accounts restored.
    pub(crate) async fn reconcile(&self) -> Result<u64> {
        let restored = self.registry.reconcile().await?;
        if restored > 0 {
            tracing::info!(restored, "Reconciled accounts left in progress");
        } else {
            tracing::debug!("No accounts left in progress");
        }
        Ok(restored)
    }

    /// Whether the previous session ended without calling [`shutdown`](Self::shutdown)
    pub fn was_unclean_shutdown(&self) -> bool {
        self.unclean_start
    }

    /// Gracefully shut down the engine
    ///
    /// Sequence:
    /// 1. Stop accepting new task invocations
    /// 2. Cancel every active invocation (steps in flight finish)
    /// 3. Wait for them to reach a terminal status, up to `shutdown_timeout`
    /// 4. Mark clean shutdown in the database
    /// 5. Emit [`Event::Shutdown`]
    ///
    /// Continues past failures in steps 3 and 4 so that as much of the
    /// sequence as possible completes.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new tasks
        self.task_state.accepting_new.store(false, Ordering::SeqCst);

        // 2. Cancel active tasks
        let cancelled = self.cancel_all().await;
        tracing::info!(cancelled, "Signalled cancellation to active tasks");

        // 3. Wait for terminal statuses
        let receivers: Vec<_> = {
            let active = self.task_state.active_tasks.lock().await;
            active.values().map(|task| task.status_rx.clone()).collect()
        };
        let waits = receivers.into_iter().map(|mut rx| async move {
            // A closed channel means the runner already went away
            rx.wait_for(TaskStatus::is_terminal).await.ok();
        });
        match tokio::time::timeout(self.config.tasks.shutdown_timeout, join_all(waits)).await {
            Ok(_) => tracing::info!("All active tasks finished"),
            Err(_) => tracing::warn!("Timeout waiting for tasks to finish, proceeding with shutdown"),
        }

        // 4. Mark clean shutdown
        if let Err(e) = self.db.set_clean_shutdown().await {
            tracing::error!(error = %e, "Failed to mark clean shutdown in database");
        } else {
            tracing::info!("Marked clean shutdown in database");
        }

        // 5. Emit shutdown event
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
