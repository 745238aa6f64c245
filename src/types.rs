//! Core types for account-tasker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Longest accepted group name; keeps derived table names well inside SQLite limits
pub const MAX_GROUP_NAME_LEN: usize = 64;

/// Validated group name
///
/// A group name is spliced into storage table names, so it is checked against
/// a strict allow-list (ASCII letters and digits only) when constructed. Code
/// holding a `GroupName` never has to re-validate it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupName(String);

impl GroupName {
    /// Validate and wrap a user-supplied group name
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::invalid_name(name, "name must not be empty"));
        }
        if name.len() > MAX_GROUP_NAME_LEN {
            return Err(Error::invalid_name(
                name,
                format!("name must be at most {} characters", MAX_GROUP_NAME_LEN),
            ));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::invalid_name(
                name,
                "name may only contain ASCII letters and digits",
            ));
        }
        Ok(Self(name.to_string()))
    }

    /// The name as supplied by the user
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded key; SQLite table names are case-insensitive
    pub fn key(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// Name of this group's account table
    pub(crate) fn accounts_table(&self) -> String {
        format!("accounts_{}", self.0)
    }

    /// Name of this group's audience-pool table
    pub(crate) fn audience_table(&self) -> String {
        format!("audience_{}", self.0)
    }
}

impl std::fmt::Display for GroupName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for GroupName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for GroupName {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        GroupName::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Unique identifier for an account within its group
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<AccountId> for i64 {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for AccountId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for AccountId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> std::result::Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for AccountId {
    fn decode(
        value: sqlx::sqlite::SqliteValueRef<'r>,
    ) -> std::result::Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Account status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Never checked
    #[default]
    Unchecked,
    /// Last check succeeded
    Valid,
    /// Last check failed
    Invalid,
    /// Claimed by a running task step
    InProgress,
}

impl AccountStatus {
    /// Convert the stored text value to a status
    pub fn from_db(value: &str) -> Self {
        match value {
            "valid" => AccountStatus::Valid,
            "invalid" => AccountStatus::Invalid,
            "in_progress" => AccountStatus::InProgress,
            _ => AccountStatus::Unchecked, // Unknown values are treated as never checked
        }
    }

    /// Text value stored in the `status_account` column
    pub fn as_db(&self) -> &'static str {
        match self {
            AccountStatus::Unchecked => "unchecked",
            AccountStatus::Valid => "valid",
            AccountStatus::Invalid => "invalid",
            AccountStatus::InProgress => "in_progress",
        }
    }

    /// Presentation tag written alongside a final status
    pub fn display_tag(&self) -> &'static str {
        match self {
            AccountStatus::Valid => "lightgreen",
            AccountStatus::Invalid => "lightcoral",
            AccountStatus::Unchecked | AccountStatus::InProgress => "",
        }
    }
}

/// Account record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable surrogate key
    pub id: AccountId,
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
    /// Current status
    pub status: AccountStatus,
    /// Messages sent over the account's lifetime (never decreases)
    pub messages_total: i64,
    /// Messages sent in the current period (resettable)
    pub messages_period: i64,
    /// Messages sent by the latest dispatch run
    pub messages_run: i64,
    /// Free-form presentation tag (e.g. a color name)
    pub display_tag: String,
}

/// Unique identifier for a task invocation (process-local)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of batch operation applied to accounts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Decide Valid/Invalid for each account
    StatusCheck,
    /// Acquire one new audience identifier per account ("parsing")
    AudiencePopulate,
    /// Spend one audience identifier per account ("sending")
    MessageDispatch,
}

impl TaskKind {
    /// Text value stored in the history table
    pub fn as_db(&self) -> &'static str {
        match self {
            TaskKind::StatusCheck => "status_check",
            TaskKind::AudiencePopulate => "audience_populate",
            TaskKind::MessageDispatch => "message_dispatch",
        }
    }

    /// Convert the stored text value to a task kind
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "status_check" => Some(TaskKind::StatusCheck),
            "audience_populate" => Some(TaskKind::AudiencePopulate),
            "message_dispatch" => Some(TaskKind::MessageDispatch),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db())
    }
}

/// Task invocation status
///
/// `Pending → Running → {Completed, Aborted, Failed}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet dispatching
    Pending,
    /// Dispatching per-account steps
    Running,
    /// Every account in the snapshot was processed
    Completed,
    /// Cancelled before the snapshot was exhausted
    Aborted,
    /// A storage fault stopped the invocation
    Failed(String),
}

impl TaskStatus {
    /// Whether the invocation has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Aborted | TaskStatus::Failed(_)
        )
    }

    /// Text value stored in the history table (reason is stored separately)
    pub fn as_db(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Aborted => "aborted",
            TaskStatus::Failed(_) => "failed",
        }
    }

    /// Rebuild a status from its stored text value and optional reason
    pub fn from_db(value: &str, reason: Option<String>) -> Self {
        match value {
            "pending" => TaskStatus::Pending,
            "running" => TaskStatus::Running,
            "completed" => TaskStatus::Completed,
            "aborted" => TaskStatus::Aborted,
            _ => TaskStatus::Failed(reason.unwrap_or_else(|| "unknown".to_string())),
        }
    }

    /// Failure reason, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            TaskStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Why a per-account step was skipped instead of applied
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// Account was already claimed by another step
    AlreadyBusy,
    /// No unused audience identifier was available
    PoolExhausted,
    /// Row-level fault (e.g. the account was deleted mid-run)
    Fault(String),
}

/// Event emitted during task and group lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Group created
    GroupCreated {
        /// Group name
        group: String,
    },

    /// Group dropped
    GroupDropped {
        /// Group name
        group: String,
    },

    /// Task invocation started dispatching
    TaskStarted {
        /// Task ID
        id: TaskId,
        /// Task kind
        kind: TaskKind,
        /// Group name
        group: String,
        /// Number of accounts in the snapshot
        total: u64,
    },

    /// One more account was processed
    TaskProgress {
        /// Task ID
        id: TaskId,
        /// Accounts processed so far (applied or skipped)
        processed: u64,
        /// Number of accounts in the snapshot
        total: u64,
    },

    /// A per-account step was skipped
    AccountSkipped {
        /// Task ID
        id: TaskId,
        /// Skipped account
        account_id: AccountId,
        /// Why it was skipped
        #[serde(flatten)]
        reason: SkipReason,
    },

    /// Task invocation reached a terminal state
    TaskFinished {
        /// Task ID
        id: TaskId,
        /// Terminal status
        status: TaskStatus,
        /// Accounts processed before the invocation ended
        processed: u64,
    },

    /// Engine is shutting down
    Shutdown,
}

/// Historical task record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// History row ID
    pub id: i64,

    /// Task kind
    pub kind: TaskKind,

    /// Group the task ran against
    pub group: String,

    /// When the invocation started
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration of the invocation
    pub duration: Duration,

    /// Terminal status
    pub status: TaskStatus,

    /// Accounts processed (applied or skipped)
    pub processed: u64,

    /// Accounts in the input snapshot
    pub total: u64,
}

/// Summary of one audience-populate run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudienceRun {
    /// Row ID
    pub id: i64,
    /// Group whose pool was grown
    pub audience_name: String,
    /// Pool size after the run
    pub total_audience_count: i64,
    /// Identifiers newly added by the run
    pub processed_audience_count: i64,
    /// When the run finished
    pub audience_date: DateTime<Utc>,
}

/// Progress of one task invocation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Accounts processed so far (applied or skipped)
    pub processed: u64,
    /// Accounts in the input snapshot
    pub total: u64,
}

/// A task invocation that has not reached a terminal state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActiveTaskInfo {
    /// Task ID
    pub id: TaskId,
    /// Task kind
    pub kind: TaskKind,
    /// Group the task runs against
    pub group: String,
    /// Current progress
    pub progress: TaskProgress,
}

/// Size of a group's audience pool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// All identifiers in the pool
    pub total: u64,
    /// Identifiers not yet handed out
    pub unused: u64,
}
