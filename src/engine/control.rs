//! Task control: cancellation and active-task inspection.

use crate::error::{Error, Result};
use crate::types::{ActiveTaskInfo, TaskId, TaskProgress};

use super::TaskEngine;

impl TaskEngine {
    /// Request cancellation of a running task invocation
    ///
    /// The step in flight completes with its effects intact; the invocation
    /// then finishes as `Aborted`. Returns [`Error::NotFound`] if no active
    /// invocation has this ID (including one that already finished).
    pub async fn cancel(&self, id: TaskId) -> Result<()> {
        let active = self.task_state.active_tasks.lock().await;
        let task = active
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))?;

        task.cancel_token.cancel();
        tracing::info!(task_id = id.0, group = %task.group, "Task cancellation requested");
        Ok(())
    }

    /// Request cancellation of every running task invocation
    ///
    /// Returns how many invocations were signalled.
    pub async fn cancel_all(&self) -> usize {
        let active = self.task_state.active_tasks.lock().await;
        tracing::debug!(active_count = active.len(), "Cancelling all active tasks");

        for (id, task) in active.iter() {
            tracing::debug!(task_id = id.0, "Signalling cancellation");
            task.cancel_token.cancel();
        }
        active.len()
    }

    /// Invocations that have not yet reached a terminal state, ordered by ID
    pub async fn active_tasks(&self) -> Vec<ActiveTaskInfo> {
        let active = self.task_state.active_tasks.lock().await;
        let mut tasks: Vec<ActiveTaskInfo> = active
            .iter()
            .map(|(id, task)| ActiveTaskInfo {
                id: *id,
                kind: task.kind,
                group: task.group.to_string(),
                progress: task.progress.snapshot(),
            })
            .collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }

    /// Progress of an active invocation
    pub async fn task_progress(&self, id: TaskId) -> Result<TaskProgress> {
        let active = self.task_state.active_tasks.lock().await;
        active
            .get(&id)
            .map(|task| task.progress.snapshot())
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))
    }
}
