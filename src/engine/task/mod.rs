//! Task execution -- one cancellable unit of work per invocation.
//!
//! Split into focused submodules:
//! - [`context`] - Shared state, progress counter, active-task cleanup
//! - [`orchestration`] - Top-level invocation lifecycle
//! - [`steps`] - Per-account step dispatch by task kind
//! - [`finalization`] - History entry and terminal status

mod context;
mod finalization;
mod orchestration;
mod steps;

pub(crate) use context::{ProgressCounter, TaskContext};
pub(crate) use orchestration::run_task;
