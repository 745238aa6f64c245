//! Task finalization -- history entry and terminal status.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::db::NewHistoryEntry;
use crate::types::{Event, TaskKind, TaskStatus};

use super::context::TaskContext;

/// Per-kind tallies collected while dispatching
#[derive(Debug, Default)]
pub(super) struct RunSummary {
    /// Identifiers newly added to the pool (audience populate)
    pub(super) identifiers_added: u64,
}

/// Record the invocation and publish its terminal status.
///
/// The history entry (and, for audience populate, the run summary) is written
/// before the status becomes observable, so a caller woken by
/// `TaskHandle::wait` always finds it. A store that is down cannot take the
/// entry; that is logged and the status is still published.
pub(super) async fn finalize_task(
    ctx: TaskContext,
    status: TaskStatus,
    started_at: DateTime<Utc>,
    elapsed: Duration,
    summary: RunSummary,
) {
    let processed = ctx.progress.processed();

    let entry = NewHistoryEntry {
        kind: ctx.kind,
        group: ctx.group.to_string(),
        started_at_ms: started_at.timestamp_millis(),
        duration_ms: elapsed.as_millis() as i64,
        status: status.clone(),
        processed,
        total: ctx.progress.total(),
    };
    if let Err(e) = ctx.db.insert_history(&entry).await {
        tracing::error!(task_id = ctx.id.0, error = %e, "Failed to append task history");
    }

    if ctx.kind == TaskKind::AudiencePopulate {
        record_audience_run(&ctx, summary.identifiers_added).await;
    }

    ctx.remove_from_active().await;

    match &status {
        TaskStatus::Failed(reason) => tracing::error!(
            task_id = ctx.id.0,
            group = %ctx.group,
            processed,
            reason = %reason,
            "Task failed"
        ),
        _ => tracing::info!(
            task_id = ctx.id.0,
            group = %ctx.group,
            processed,
            status = status.as_db(),
            duration_ms = elapsed.as_millis() as u64,
            "Task finished"
        ),
    }

    ctx.set_status(status.clone());
    ctx.emit(Event::TaskFinished {
        id: ctx.id,
        status,
        processed,
    });
}

async fn record_audience_run(ctx: &TaskContext, added: u64) {
    let stats = match ctx.allocator.pool_stats(&ctx.group).await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::warn!(task_id = ctx.id.0, error = %e, "Failed to read pool size for run summary");
            return;
        }
    };

    if let Err(e) = ctx
        .db
        .insert_audience_run(ctx.group.as_str(), stats.total as i64, added as i64)
        .await
    {
        tracing::warn!(task_id = ctx.id.0, error = %e, "Failed to record audience run");
    }
}
