//! # account-tasker
//!
//! Storage and batch-task engine for pools of accounts grouped by name.
//!
//! A group owns a set of account records and an audience pool of opaque
//! identifiers. Three kinds of batch task run over a group's accounts:
//!
//! - **Status check** decides `Valid`/`Invalid` for each account
//! - **Audience populate** grows the group's pool by one identifier per account
//! - **Message dispatch** spends one unused identifier per account
//!
//! Task invocations run in the background and report progress through
//! events. An account is claimed by at most one step at a time, and an
//! identifier is handed out at most once, even across concurrent tasks.
//!
//! ## Quick Start
//!
//! ```no_run
//! use account_tasker::{Config, TaskEngine, TaskKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = TaskEngine::new(Config::default()).await?;
//!
//!     engine.create_group("grpA").await?;
//!     engine.generate_accounts("grpA", 10).await?;
//!     engine.add_identifiers("grpA", &["111", "222"]).await?;
//!
//!     // Subscribe to events
//!     let mut events = engine.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let handle = engine.start_all("grpA", TaskKind::MessageDispatch).await?;
//!     println!("finished: {:?}", handle.wait().await);
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Audience pools and at-most-once allocation
pub mod allocator;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Task engine facade (decomposed into focused submodules)
pub mod engine;
/// Error types
pub mod error;
/// Account records, the busy claim and CSV import
pub mod registry;
/// Flat key=value user settings
pub mod settings;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use allocator::{AudienceAllocator, AudienceSource, RandomAudienceSource};
pub use config::{Config, PersistenceConfig, TaskConfig};
pub use db::{AudienceIdentifier, Database, NewAccount};
pub use engine::{TaskEngine, TaskHandle};
pub use error::{DatabaseError, Error, Result};
pub use registry::{AccountRegistry, ImportReport, RandomStatusPolicy, StatusPolicy};
pub use settings::Settings;
pub use types::{
    Account, AccountId, AccountStatus, ActiveTaskInfo, AudienceRun, Event, GroupName,
    HistoryEntry, PoolStats, SkipReason, TaskId, TaskKind, TaskProgress, TaskStatus,
};
