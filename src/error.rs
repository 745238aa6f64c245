//! Error types for account-tasker
//!
//! This module provides error handling for the library, including:
//! - The crate-wide [`Error`] enum covering invalid names, missing records,
//!   busy accounts, exhausted audience pools and storage faults
//! - A [`DatabaseError`] sub-enum with context about which storage step failed
//! - Classification of faults into per-row (skip-and-continue) and
//!   connectivity-level (abort the task invocation)
//! - Machine-readable error codes for the foreground layer

use thiserror::Error;

/// Result type alias for account-tasker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for account-tasker
///
/// Each variant includes enough context to render a user-visible message.
#[derive(Debug, Error)]
pub enum Error {
    /// Group name failed the alphanumeric constraint or already exists
    #[error("invalid group name '{name}': {reason}")]
    InvalidName {
        /// The rejected name, as supplied by the caller
        name: String,
        /// Why the name was rejected
        reason: String,
    },

    /// Referenced group, account or identifier does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Account is already claimed by another task step
    #[error("account {account_id} in group '{group}' is already in progress")]
    AlreadyBusy {
        /// Group the account belongs to
        group: String,
        /// The busy account
        account_id: i64,
    },

    /// No unused audience identifier is left in the group's pool
    #[error("audience pool of group '{0}' is exhausted")]
    PoolExhausted(String),

    /// Drop/alter requested while a task invocation is active against the group
    #[error("group '{group}' has {active} active task(s)")]
    GroupBusy {
        /// The busy group
        group: String,
        /// Number of task invocations currently running against it
        active: usize,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "database_path")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding error during account import
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new task invocations
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// SQLite primary result codes that describe the store rather than a row:
/// BUSY, LOCKED, NOMEM, READONLY, IOERR, CORRUPT, FULL, CANTOPEN, PROTOCOL, NOTADB
const STORE_LEVEL_SQLITE_CODES: [i32; 10] = [5, 6, 7, 8, 10, 11, 13, 14, 15, 26];

/// Whether a sqlx error means the store is unreachable, locked or corrupt.
///
/// SQLite reports extended result codes; the primary code is the low byte.
pub(crate) fn is_store_level(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::PoolClosed
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::Io(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| STORE_LEVEL_SQLITE_CODES.contains(&(code & 0xff))),
        _ => false,
    }
}

impl Error {
    /// Build an [`Error::InvalidName`] from anything string-like
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means the store itself is unreachable or corrupt.
    ///
    /// Storage faults abort the current task invocation with `Failed(reason)`.
    /// Every other error is treated as a per-account fault: the account is
    /// skipped and the invocation continues.
    pub fn is_storage_fault(&self) -> bool {
        match self {
            Error::Database(DatabaseError::ConnectionFailed(_))
            | Error::Database(DatabaseError::MigrationFailed(_)) => true,
            Error::Sqlx(e) => is_store_level(e),
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Whether this error is one of the expected skip conditions of a task step
    pub fn is_skip(&self) -> bool {
        matches!(self, Error::AlreadyBusy { .. } | Error::PoolExhausted(_))
    }

    /// Machine-readable error code for display and programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidName { .. } => "invalid_name",
            Error::NotFound(_) | Error::Database(DatabaseError::NotFound(_)) => "not_found",
            Error::AlreadyBusy { .. } => "already_busy",
            Error::PoolExhausted(_) => "pool_exhausted",
            Error::GroupBusy { .. } => "group_busy",
            Error::Config { .. } => "config_error",
            Error::Database(DatabaseError::ConstraintViolation(_)) => "conflict",
            Error::Database(_) | Error::Sqlx(_) => "storage_fault",
            Error::Io(_) => "io_error",
            Error::Csv(_) => "import_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}
