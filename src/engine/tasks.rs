//! Starting task invocations and observing them through a [`TaskHandle`].

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::{Account, GroupName, TaskId, TaskKind, TaskProgress, TaskStatus};

use super::task::{ProgressCounter, TaskContext, run_task};
use super::{ActiveTask, TaskEngine};

/// Caller-side view of one running task invocation
///
/// Dropping the handle does not cancel the invocation.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    id: TaskId,
    kind: TaskKind,
    group: GroupName,
    progress: Arc<ProgressCounter>,
    cancel_token: CancellationToken,
    status_rx: watch::Receiver<TaskStatus>,
}

impl TaskHandle {
    /// Process-local ID of the invocation
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Kind of operation being applied
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Group the invocation runs against
    pub fn group(&self) -> &GroupName {
        &self.group
    }

    /// Current `(processed, total)`; never blocks the runner
    pub fn progress(&self) -> TaskProgress {
        self.progress.snapshot()
    }

    /// Latest published status
    pub fn status(&self) -> TaskStatus {
        self.status_rx.borrow().clone()
    }

    /// Request cancellation
    ///
    /// The step in flight finishes; no further accounts are dispatched.
    /// Cancelling an invocation that already finished has no effect.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Wait until the invocation reaches a terminal status and return it
    ///
    /// When this returns, the invocation's history entry has been written.
    pub async fn wait(&self) -> TaskStatus {
        let mut rx = self.status_rx.clone();
        let outcome = rx
            .wait_for(TaskStatus::is_terminal)
            .await
            .map(|status| (*status).clone());

        match outcome {
            Ok(status) => status,
            Err(_) => {
                // Runner went away without publishing a terminal status
                let last = rx.borrow().clone();
                if last.is_terminal() {
                    last
                } else {
                    TaskStatus::Failed("task runner stopped unexpectedly".to_string())
                }
            }
        }
    }
}

impl TaskEngine {
    /// Start a task invocation over an explicit account snapshot
    ///
    /// Returns as soon as the invocation is registered; steps run in the
    /// background, one account at a time in snapshot order. Accounts that are
    /// deleted or claimed by another invocation meanwhile are skipped, not
    /// treated as failures.
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun
    /// - [`Error::InvalidName`] / [`Error::NotFound`] if the group is malformed or missing
    pub async fn start(
        &self,
        group: &str,
        kind: TaskKind,
        accounts: Vec<Account>,
    ) -> Result<TaskHandle> {
        if !self.task_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let group = GroupName::parse(group)?;

        // Register against the group under the same lock drop_group holds
        {
            let mut active_groups = self.task_state.active_groups.lock().await;
            self.db.require_group(&group).await?;
            *active_groups.entry(group.key()).or_insert(0) += 1;
        }

        let id = TaskId(self.task_state.next_task_id.fetch_add(1, Ordering::SeqCst) + 1);
        let cancel_token = CancellationToken::new();
        let progress = Arc::new(ProgressCounter::new(accounts.len() as u64));
        let (status_tx, status_rx) = watch::channel(TaskStatus::Pending);

        {
            let mut active = self.task_state.active_tasks.lock().await;
            active.insert(
                id,
                ActiveTask {
                    kind,
                    group: group.clone(),
                    cancel_token: cancel_token.clone(),
                    progress: Arc::clone(&progress),
                    status_rx: status_rx.clone(),
                },
            );
        }

        let ctx = TaskContext {
            id,
            kind,
            group: group.clone(),
            db: Arc::clone(&self.db),
            registry: Arc::clone(&self.registry),
            allocator: Arc::clone(&self.allocator),
            event_tx: self.event_tx.clone(),
            cancel_token: cancel_token.clone(),
            progress: Arc::clone(&progress),
            status_tx,
            step_delay: self.config.tasks.step_delay,
            task_state: self.task_state.clone(),
        };

        tracing::debug!(task_id = id.0, kind = %kind, group = %group, "Spawning task");
        tokio::spawn(run_task(ctx, accounts));

        Ok(TaskHandle {
            id,
            kind,
            group,
            progress,
            cancel_token,
            status_rx,
        })
    }

    /// Start a task invocation over every account currently in the group
    ///
    /// The snapshot is taken once, here; accounts added later are not visited.
    pub async fn start_all(&self, group: &str, kind: TaskKind) -> Result<TaskHandle> {
        let parsed = GroupName::parse(group)?;
        let accounts = self.registry.list_accounts(&parsed).await?;
        self.start(group, kind, accounts).await
    }
}
