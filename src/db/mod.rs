//! Database layer for account-tasker
//!
//! Handles SQLite persistence for groups, accounts, audience pools and task history.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`groups`] - Group create/drop and the group registry
//! - [`accounts`] - Account CRUD, counters and the busy claim
//! - [`audience`] - Audience-pool growth and atomic allocation
//! - [`history`] - Append-only task history
//! - [`audience_runs`] - Audience-populate run summaries
//! - [`state`] - Runtime state (shutdown tracking)
//!
//! Each group owns two tables, `accounts_<name>` and `audience_<name>`. Table
//! names are only ever derived from a validated [`GroupName`].

use crate::error::{DatabaseError, Error, is_store_level};
use crate::types::{Account, AccountId, AccountStatus, AudienceRun, GroupName, HistoryEntry};
use crate::types::{TaskKind, TaskStatus};
use sqlx::{FromRow, sqlite::SqlitePool};

mod accounts;
mod audience;
mod audience_runs;
mod groups;
mod history;
mod migrations;
mod state;

/// New account to be inserted into a group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAccount {
    /// Login name
    pub username: String,
    /// Login secret
    pub password: String,
    /// User-agent string
    pub user_agent: String,
    /// Session cookie
    pub cookie: String,
    /// Device fingerprint
    pub device: String,
}

impl NewAccount {
    /// Account with only the required credentials set
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }
}

/// Account record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    /// Unique database ID
    pub id: i64,
    /// Login name
    pub username: String,
    /// Login secret
    pub password: String,
    /// User-agent string
    pub ua: String,
    /// Session cookie
    pub cookie: String,
    /// Device fingerprint
    pub device: String,
    /// Status text (see [`AccountStatus::as_db`])
    pub status_account: String,
    /// Lifetime message counter
    pub messages_total: i64,
    /// Resettable period counter
    pub messages_day: i64,
    /// Latest-run counter
    pub messages_run: i64,
    /// Presentation tag
    pub color: String,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: AccountId(row.id),
            username: row.username,
            password: row.password,
            user_agent: row.ua,
            cookie: row.cookie,
            device: row.device,
            status: AccountStatus::from_db(&row.status_account),
            messages_total: row.messages_total,
            messages_period: row.messages_day,
            messages_run: row.messages_run,
            display_tag: row.color,
        }
    }
}

/// Audience identifier record from database
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AudienceIdentifier {
    /// Unique database ID
    pub id: i64,
    /// Identifier value (unique within the pool)
    #[sqlx(rename = "audience_id")]
    pub value: String,
    /// Whether the identifier has been handed out
    pub used: bool,
}

/// New history entry to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    /// Task kind
    pub kind: TaskKind,
    /// Group the task ran against
    pub group: String,
    /// Unix timestamp (milliseconds) when the task started
    pub started_at_ms: i64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: i64,
    /// Terminal status
    pub status: TaskStatus,
    /// Accounts processed
    pub processed: u64,
    /// Accounts in the input snapshot
    pub total: u64,
}

/// History record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    /// Unique database ID
    pub id: i64,
    /// Task kind text
    pub task_kind: String,
    /// Group name
    pub group_name: String,
    /// Unix timestamp (milliseconds) when the task started
    pub started_at: i64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: i64,
    /// Terminal status text
    pub status: String,
    /// Failure reason, if any
    pub reason: Option<String>,
    /// Accounts processed
    pub processed: i64,
    /// Accounts in the input snapshot
    pub total: i64,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        use chrono::{TimeZone, Utc};
        use std::time::Duration;

        HistoryEntry {
            id: row.id,
            // Rows are only written by this crate; an unknown kind means a newer writer
            kind: TaskKind::from_db(&row.task_kind).unwrap_or(TaskKind::StatusCheck),
            group: row.group_name,
            started_at: Utc
                .timestamp_millis_opt(row.started_at)
                .single()
                .unwrap_or_else(Utc::now),
            duration: Duration::from_millis(row.duration_ms.max(0) as u64),
            status: TaskStatus::from_db(&row.status, row.reason),
            processed: row.processed.max(0) as u64,
            total: row.total.max(0) as u64,
        }
    }
}

/// Audience-run summary from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct AudienceRunRow {
    /// Unique database ID
    pub id: i64,
    /// Group whose pool was grown
    pub audience_name: String,
    /// Pool size after the run
    pub total_audience_count: i64,
    /// Identifiers newly added by the run
    pub processed_audience_count: i64,
    /// RFC 3339 timestamp
    pub audience_date: String,
}

impl From<AudienceRunRow> for AudienceRun {
    fn from(row: AudienceRunRow) -> Self {
        use chrono::{DateTime, Utc};

        AudienceRun {
            id: row.id,
            audience_name: row.audience_name,
            total_audience_count: row.total_audience_count,
            processed_audience_count: row.processed_audience_count,
            audience_date: DateTime::parse_from_rfc3339(&row.audience_date)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}

/// Database handle for account-tasker
pub struct Database {
    pool: SqlitePool,
}

/// Map an error from a query against a group's tables.
///
/// Store-level errors stay sqlx errors so callers classify them as storage
/// faults; a missing table means the group does not exist.
pub(crate) fn group_query_error(group: &GroupName, context: &str, e: sqlx::Error) -> Error {
    if is_store_level(&e) {
        return Error::Sqlx(e);
    }
    let missing_table = e
        .as_database_error()
        .is_some_and(|db_err| db_err.message().contains("no such table"));
    if missing_table {
        return Error::NotFound(format!("group '{}'", group));
    }
    Error::Database(DatabaseError::QueryFailed(format!(
        "{} (group '{}'): {}",
        context, group, e
    )))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
