//! Event-driven waiting helpers

use account_tasker::{Event, SkipReason, TaskId, TaskStatus};
use std::time::Duration;
use tokio::sync::broadcast;

/// Everything observed for one task invocation, up to its `TaskFinished` event
#[derive(Debug, Default)]
pub struct TaskTrace {
    /// `processed` values of each `TaskProgress` event, in order
    pub progress: Vec<u64>,
    /// Skip reasons, in order
    pub skipped: Vec<SkipReason>,
    /// Terminal status, if the invocation finished before the timeout
    pub finished: Option<TaskStatus>,
}

/// Collect events for `id` until it finishes or `timeout` elapses
///
/// Subscribe before starting the task so no event is missed.
pub async fn collect_task_events(
    events: &mut broadcast::Receiver<Event>,
    id: TaskId,
    timeout: Duration,
) -> TaskTrace {
    let mut trace = TaskTrace::default();

    let _ = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::TaskProgress {
                    id: event_id,
                    processed,
                    ..
                }) if event_id == id => trace.progress.push(processed),
                Ok(Event::AccountSkipped {
                    id: event_id,
                    reason,
                    ..
                }) if event_id == id => trace.skipped.push(reason),
                Ok(Event::TaskFinished {
                    id: event_id,
                    status,
                    ..
                }) if event_id == id => {
                    trace.finished = Some(status);
                    return;
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
    .await;

    trace
}
