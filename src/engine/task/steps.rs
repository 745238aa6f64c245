//! Per-account step dispatch.
//!
//! Every step claims its account first; a claim that fails with
//! `AlreadyBusy` means another step owns the account and this one is skipped.
//! The claim is always released before the step returns, either with the
//! step's final status (status check) or back to the prior status.

use crate::error::Result;
use crate::types::{Account, AccountStatus, TaskKind};

use super::context::TaskContext;

/// What a successful step did
#[derive(Debug)]
pub(super) enum StepOutcome {
    /// Status check stored a verdict
    Checked(AccountStatus),
    /// Audience populate offered one identifier; `added` is false for a duplicate
    Populated { added: bool },
    /// Message dispatch spent one identifier
    Dispatched { identifier: String },
}

/// Run one per-account step of the invocation.
pub(super) async fn run_step(ctx: &TaskContext, account: &Account) -> Result<StepOutcome> {
    ctx.registry.claim(&ctx.group, account.id).await?;

    // Simulated latency; real policies suspend on I/O here instead
    if !ctx.step_delay.is_zero() {
        tokio::time::sleep(ctx.step_delay).await;
    }

    let result = apply(ctx, account).await;

    // A stored verdict already released the claim
    if !matches!(result, Ok(StepOutcome::Checked(_))) {
        if let Err(e) = ctx.registry.release(&ctx.group, account.id).await {
            tracing::warn!(
                task_id = ctx.id.0,
                account_id = account.id.0,
                error = %e,
                "Failed to release account claim"
            );
            if result.is_ok() || e.is_storage_fault() {
                return Err(e);
            }
        }
    }

    result
}

async fn apply(ctx: &TaskContext, account: &Account) -> Result<StepOutcome> {
    match ctx.kind {
        TaskKind::StatusCheck => {
            let status = ctx.registry.decide(account).await?;
            ctx.registry.finish(&ctx.group, account.id, status).await?;
            Ok(StepOutcome::Checked(status))
        }
        TaskKind::AudiencePopulate => {
            let added = ctx.allocator.populate_one(&ctx.group).await?;
            Ok(StepOutcome::Populated { added })
        }
        TaskKind::MessageDispatch => {
            let identifier = ctx.allocator.allocate_one(&ctx.group).await?;
            ctx.registry
                .bump_message_counters(&ctx.group, account.id, 1)
                .await?;
            Ok(StepOutcome::Dispatched { identifier })
        }
    }
}
