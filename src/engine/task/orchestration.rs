//! Task orchestration -- top-level lifecycle for a single invocation.

use std::time::Instant;

use chrono::Utc;

use crate::error::Error;
use crate::types::{Account, AccountId, Event, SkipReason, TaskKind, TaskStatus};

use super::context::TaskContext;
use super::finalization::{RunSummary, finalize_task};
use super::steps::{StepOutcome, run_step};

/// Core task loop -- applies the kind's step to every account of the snapshot.
///
/// Phases:
/// 1. Transition to Running
/// 2. Kind-specific preparation (dispatch resets the run counters)
/// 3. Dispatch accounts in snapshot order, checking cancellation before each;
///    an abort closes out the remaining accounts without dispatching them
/// 4. Finalize: history entry, terminal status, active-task cleanup
pub(crate) async fn run_task(ctx: TaskContext, accounts: Vec<Account>) {
    let started_at = Utc::now();
    let clock = Instant::now();
    let mut summary = RunSummary::default();

    // Phase 1: Running
    ctx.set_status(TaskStatus::Running);
    ctx.emit(Event::TaskStarted {
        id: ctx.id,
        kind: ctx.kind,
        group: ctx.group.to_string(),
        total: ctx.progress.total(),
    });
    tracing::info!(
        task_id = ctx.id.0,
        kind = %ctx.kind,
        group = %ctx.group,
        total = accounts.len(),
        "Task started"
    );

    // Phase 2: Preparation
    if let Err(e) = prepare(&ctx, &accounts).await {
        tracing::error!(task_id = ctx.id.0, error = %e, "Task preparation failed");
        let status = TaskStatus::Failed(e.to_string());
        finalize_task(ctx, status, started_at, clock.elapsed(), summary).await;
        return;
    }

    // Phase 3: Dispatch
    let mut status = TaskStatus::Completed;
    for account in &accounts {
        if ctx.cancel_token.is_cancelled() {
            tracing::info!(
                task_id = ctx.id.0,
                processed = ctx.progress.processed(),
                "Task cancelled, no further accounts dispatched"
            );
            status = TaskStatus::Aborted;
            break;
        }

        match run_step(&ctx, account).await {
            Ok(StepOutcome::Populated { added }) => {
                if added {
                    summary.identifiers_added += 1;
                }
            }
            Ok(StepOutcome::Dispatched { identifier }) => {
                tracing::debug!(
                    task_id = ctx.id.0,
                    account_id = account.id.0,
                    identifier = %identifier,
                    "Message dispatched"
                );
            }
            Ok(StepOutcome::Checked(verdict)) => {
                tracing::debug!(
                    task_id = ctx.id.0,
                    account_id = account.id.0,
                    status = verdict.as_db(),
                    "Account checked"
                );
            }
            Err(e) if e.is_storage_fault() => {
                tracing::error!(
                    task_id = ctx.id.0,
                    account_id = account.id.0,
                    error = %e,
                    "Storage fault, aborting remaining steps"
                );
                status = TaskStatus::Failed(e.to_string());
                break;
            }
            Err(e) => skip_account(&ctx, account.id, e),
        }

        let processed = ctx.progress.advance();
        ctx.emit(Event::TaskProgress {
            id: ctx.id,
            processed,
            total: ctx.progress.total(),
        });
    }

    // Accounts left undispatched by a cancel still count toward progress
    if status == TaskStatus::Aborted {
        let left = ctx.progress.finish();
        if left > 0 {
            tracing::debug!(task_id = ctx.id.0, left, "Undispatched accounts closed out");
            ctx.emit(Event::TaskProgress {
                id: ctx.id,
                processed: ctx.progress.total(),
                total: ctx.progress.total(),
            });
        }
    }

    // Phase 4: Finalize
    finalize_task(ctx, status, started_at, clock.elapsed(), summary).await;
}

/// Work done once before the first step.
async fn prepare(ctx: &TaskContext, accounts: &[Account]) -> crate::Result<()> {
    if ctx.kind == TaskKind::MessageDispatch {
        let ids: Vec<AccountId> = accounts.iter().map(|a| a.id).collect();
        let reset = ctx.registry.reset_run_counters(&ctx.group, &ids).await?;
        tracing::debug!(task_id = ctx.id.0, reset, "Run counters reset");
    }
    Ok(())
}

/// Record a per-account fault and keep going.
fn skip_account(ctx: &TaskContext, account_id: AccountId, error: Error) {
    let reason = match error {
        Error::AlreadyBusy { .. } => SkipReason::AlreadyBusy,
        Error::PoolExhausted(_) => SkipReason::PoolExhausted,
        other => SkipReason::Fault(other.to_string()),
    };
    tracing::warn!(
        task_id = ctx.id.0,
        account_id = account_id.0,
        reason = ?reason,
        "Account skipped"
    );
    ctx.emit(Event::AccountSkipped {
        id: ctx.id,
        account_id,
        reason,
    });
}
