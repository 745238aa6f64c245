//! Account registry: typed account operations and the busy invariant.
//!
//! The registry wraps the store's account operations. Every task step goes
//! through [`AccountRegistry::claim`] first, which flips the account to
//! `InProgress` in a single compare-and-set statement; a second step on the
//! same account observes [`Error::AlreadyBusy`] and is skipped.
//!
//! The Valid/Invalid decision itself is a pluggable [`StatusPolicy`].

use async_trait::async_trait;
use serde::Deserialize;
use std::io::Read;
use std::sync::Arc;

use crate::db::{Database, NewAccount};
use crate::error::{Error, Result};
use crate::types::{Account, AccountId, AccountStatus, GroupName};

/// Decides whether an account is usable
#[async_trait]
pub trait StatusPolicy: Send + Sync {
    /// Produce `Valid` or `Invalid` for the account
    ///
    /// Returning an error leaves the account at the status it had before
    /// the check.
    async fn decide(&self, account: &Account) -> Result<AccountStatus>;
}

/// Placeholder policy: a fair coin flip
pub struct RandomStatusPolicy;

#[async_trait]
impl StatusPolicy for RandomStatusPolicy {
    async fn decide(&self, _account: &Account) -> Result<AccountStatus> {
        if rand::random::<bool>() {
            Ok(AccountStatus::Valid)
        } else {
            Ok(AccountStatus::Invalid)
        }
    }
}

/// Outcome of a CSV account import
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Rows inserted as new accounts
    pub inserted: usize,
    /// Rows skipped, as (1-based data row number, reason)
    pub skipped: Vec<(usize, String)>,
}

/// One CSV row; every column is optional so missing keys can be reported per row
#[derive(Debug, Deserialize)]
struct CsvAccountRow {
    username: Option<String>,
    password: Option<String>,
    ua: Option<String>,
    cookie: Option<String>,
    device: Option<String>,
}

impl CsvAccountRow {
    fn into_new_account(self) -> std::result::Result<NewAccount, String> {
        let username = self
            .username
            .filter(|v| !v.is_empty())
            .ok_or_else(|| "missing required column 'username'".to_string())?;
        let password = self
            .password
            .filter(|v| !v.is_empty())
            .ok_or_else(|| "missing required column 'password'".to_string())?;
        Ok(NewAccount {
            username,
            password,
            user_agent: self.ua.unwrap_or_default(),
            cookie: self.cookie.unwrap_or_default(),
            device: self.device.unwrap_or_default(),
        })
    }
}

/// Parse header-keyed CSV into accounts, collecting per-row rejections
///
/// Fails only if the header itself cannot be read.
pub fn parse_accounts_csv<R: Read>(reader: R) -> Result<(Vec<NewAccount>, ImportReport)> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    // Surface a broken header as an error rather than one skip per row
    csv_reader.headers()?;

    let mut accounts = Vec::new();
    let mut report = ImportReport::default();
    for (index, row) in csv_reader.deserialize::<CsvAccountRow>().enumerate() {
        let row_number = index + 1;
        let parsed = row
            .map_err(|e| e.to_string())
            .and_then(CsvAccountRow::into_new_account);
        match parsed {
            Ok(account) => accounts.push(account),
            Err(reason) => {
                tracing::warn!(row = row_number, reason = %reason, "Skipping CSV row");
                report.skipped.push((row_number, reason));
            }
        }
    }
    Ok((accounts, report))
}

/// Typed view over the store for account CRUD and status transitions
pub struct AccountRegistry {
    db: Arc<Database>,
    policy: Arc<dyn StatusPolicy>,
}

impl AccountRegistry {
    /// Create a registry over `db` that decides statuses with `policy`
    pub fn new(db: Arc<Database>, policy: Arc<dyn StatusPolicy>) -> Self {
        Self { db, policy }
    }

    /// Insert one account; it starts `Unchecked` with zero counters
    pub async fn insert_account(&self, group: &GroupName, account: &NewAccount) -> Result<AccountId> {
        let id = self.db.insert_account(group, account).await?;
        tracing::debug!(group = %group, account_id = id.0, "Account inserted");
        Ok(id)
    }

    /// Import accounts from header-keyed CSV
    ///
    /// Required columns are `username` and `password`; `ua`, `cookie` and
    /// `device` are optional. Rows missing a required value are skipped and
    /// reported; valid rows are inserted one at a time.
    pub async fn import_csv<R: Read + Send>(&self, group: &GroupName, reader: R) -> Result<ImportReport> {
        self.db.require_group(group).await?;
        let (accounts, mut report) = parse_accounts_csv(reader)?;

        for account in &accounts {
            self.db.insert_account(group, account).await?;
            report.inserted += 1;
        }

        tracing::info!(
            group = %group,
            inserted = report.inserted,
            skipped = report.skipped.len(),
            "CSV import finished"
        );
        Ok(report)
    }

    /// Fill a group with synthetic accounts (`user_N`, `pass_N`, ...)
    pub async fn generate_accounts(&self, group: &GroupName, count: usize) -> Result<Vec<AccountId>> {
        let accounts: Vec<NewAccount> = (1..=count)
            .map(|n| NewAccount {
                username: format!("user_{}", n),
                password: format!("pass_{}", n),
                user_agent: format!("UA_{}", n),
                cookie: format!("cookie_{}", n),
                device: format!("device_{}", n),
            })
            .collect();

        let ids = self.db.insert_accounts(group, &accounts).await?;
        tracing::info!(group = %group, count = ids.len(), "Generated accounts");
        Ok(ids)
    }

    /// Get an account, failing with [`Error::NotFound`] when absent
    pub async fn get_account(&self, group: &GroupName, id: AccountId) -> Result<Account> {
        self.db
            .get_account(group, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("account {} in group '{}'", id, group)))
    }

    /// Point-in-time snapshot of a group's accounts, in insertion order
    pub async fn list_accounts(&self, group: &GroupName) -> Result<Vec<Account>> {
        self.db.list_accounts(group).await
    }

    /// Set a final status; the presentation tag follows the status
    pub async fn set_status(&self, group: &GroupName, id: AccountId, status: AccountStatus) -> Result<()> {
        self.db
            .update_account_status(group, id, status, status.display_tag())
            .await
    }

    /// Delete accounts; refused with [`Error::AlreadyBusy`] if any is claimed
    pub async fn delete_accounts(&self, group: &GroupName, ids: &[AccountId]) -> Result<u64> {
        self.db.delete_accounts(group, ids).await
    }

    /// Add to an account's message counters
    pub async fn bump_message_counters(&self, group: &GroupName, id: AccountId, delta: i64) -> Result<()> {
        self.db.bump_message_counters(group, id, delta).await
    }

    /// Zero the latest-run counter of the given accounts
    pub async fn reset_run_counters(&self, group: &GroupName, ids: &[AccountId]) -> Result<u64> {
        self.db.reset_run_counters(group, ids).await
    }

    /// Zero the period counter of every account in the group
    pub async fn reset_period_counters(&self, group: &GroupName) -> Result<u64> {
        let reset = self.db.reset_period_counters(group).await?;
        tracing::info!(group = %group, reset, "Period counters reset");
        Ok(reset)
    }

    /// Claim an account for a task step, returning its prior status
    pub async fn claim(&self, group: &GroupName, id: AccountId) -> Result<AccountStatus> {
        self.db.try_claim_account(group, id).await
    }

    /// Release a claimed account with a final status
    pub async fn finish(&self, group: &GroupName, id: AccountId, status: AccountStatus) -> Result<()> {
        self.db.finish_account(group, id, status).await
    }

    /// Release a claimed account back to its prior status
    pub async fn release(&self, group: &GroupName, id: AccountId) -> Result<()> {
        self.db.restore_account(group, id).await
    }

    /// Ask the status policy for a verdict without touching the store
    pub(crate) async fn decide(&self, account: &Account) -> Result<AccountStatus> {
        self.policy.decide(account).await
    }

    /// Run the status check for one account
    ///
    /// Claims the account, asks the policy, and stores the verdict. If the
    /// policy fails the claim is released and the account keeps its old status.
    pub async fn check_status(&self, group: &GroupName, account: &Account) -> Result<AccountStatus> {
        self.claim(group, account.id).await?;

        match self.policy.decide(account).await {
            Ok(status) => {
                self.finish(group, account.id, status).await?;
                tracing::debug!(group = %group, account_id = account.id.0, status = status.as_db(), "Account checked");
                Ok(status)
            }
            Err(e) => {
                if let Err(release_err) = self.release(group, account.id).await {
                    tracing::warn!(
                        group = %group,
                        account_id = account.id.0,
                        error = %release_err,
                        "Failed to release account after policy error"
                    );
                }
                Err(e)
            }
        }
    }

    /// Restore every `InProgress` account in every group
    ///
    /// Run at startup, before any task can hold a claim.
    pub async fn reconcile(&self) -> Result<u64> {
        let mut repaired = 0;
        for group in self.db.list_groups().await? {
            let count = self.db.reconcile_in_progress(&group).await?;
            if count > 0 {
                tracing::warn!(group = %group, count, "Restored accounts left in progress");
            }
            repaired += count;
        }
        Ok(repaired)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPolicy(AccountStatus);

    #[async_trait]
    impl StatusPolicy for FixedPolicy {
        async fn decide(&self, _account: &Account) -> Result<AccountStatus> {
            Ok(self.0)
        }
    }

    struct FailingPolicy;

    #[async_trait]
    impl StatusPolicy for FailingPolicy {
        async fn decide(&self, _account: &Account) -> Result<AccountStatus> {
            Err(Error::Other("checker offline".into()))
        }
    }

    async fn registry_with(
        policy: Arc<dyn StatusPolicy>,
    ) -> (tempfile::NamedTempFile, AccountRegistry, GroupName) {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let db = Arc::new(Database::new(temp_file.path()).await.unwrap());
        let group = GroupName::parse("grpA").unwrap();
        db.create_group(&group).await.unwrap();
        (temp_file, AccountRegistry::new(db, policy), group)
    }

    #[test]
    fn csv_rows_missing_required_keys_are_reported() {
        let data = "username,password,ua\nalice,pw1,UA1\n,pw2,UA2\nbob,,UA3\ncarol,pw4\n";
        let (accounts, report) = parse_accounts_csv(data.as_bytes()).unwrap();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].username, "alice");
        assert_eq!(accounts[0].user_agent, "UA1");
        assert_eq!(accounts[1].username, "carol");
        assert_eq!(accounts[1].user_agent, "");
        assert_eq!(
            report.skipped.iter().map(|(row, _)| *row).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert!(report.skipped[0].1.contains("username"));
    }

    #[test]
    fn csv_without_password_column_skips_every_row() {
        let data = "username,cookie\nalice,c1\n";
        let (accounts, report) = parse_accounts_csv(data.as_bytes()).unwrap();
        assert!(accounts.is_empty());
        assert_eq!(report.skipped.len(), 1);
    }

    #[tokio::test]
    async fn import_csv_inserts_valid_rows() {
        let (_temp_file, registry, group) = registry_with(Arc::new(RandomStatusPolicy)).await;

        let data = "username,password,device\nalice,pw,pixel\n,nope,x\n";
        let report = registry.import_csv(&group, data.as_bytes()).await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped.len(), 1);

        let accounts = registry.list_accounts(&group).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].device, "pixel");
    }

    #[tokio::test]
    async fn import_into_missing_group_is_not_found() {
        let (_temp_file, registry, _group) = registry_with(Arc::new(RandomStatusPolicy)).await;
        let ghost = GroupName::parse("ghost").unwrap();

        let err = registry
            .import_csv(&ghost, "username,password\na,b\n".as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn generate_accounts_uses_numbered_fields() {
        let (_temp_file, registry, group) = registry_with(Arc::new(RandomStatusPolicy)).await;

        let ids = registry.generate_accounts(&group, 3).await.unwrap();
        assert_eq!(ids.len(), 3);

        let third = registry.get_account(&group, ids[2]).await.unwrap();
        assert_eq!(third.username, "user_3");
        assert_eq!(third.device, "device_3");
    }

    #[tokio::test]
    async fn get_missing_account_is_not_found() {
        let (_temp_file, registry, group) = registry_with(Arc::new(RandomStatusPolicy)).await;
        let err = registry.get_account(&group, AccountId(7)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn check_status_stores_verdict_and_tag() {
        let (_temp_file, registry, group) =
            registry_with(Arc::new(FixedPolicy(AccountStatus::Invalid))).await;
        let id = registry
            .insert_account(&group, &NewAccount::new("alice", "pw"))
            .await
            .unwrap();
        let account = registry.get_account(&group, id).await.unwrap();

        let status = registry.check_status(&group, &account).await.unwrap();
        assert_eq!(status, AccountStatus::Invalid);

        let stored = registry.get_account(&group, id).await.unwrap();
        assert_eq!(stored.status, AccountStatus::Invalid);
        assert_eq!(stored.display_tag, "lightcoral");
    }

    #[tokio::test]
    async fn check_status_on_busy_account_is_skipped() {
        let (_temp_file, registry, group) =
            registry_with(Arc::new(FixedPolicy(AccountStatus::Valid))).await;
        let id = registry
            .insert_account(&group, &NewAccount::new("alice", "pw"))
            .await
            .unwrap();
        let account = registry.get_account(&group, id).await.unwrap();

        registry.claim(&group, id).await.unwrap();
        let err = registry.check_status(&group, &account).await.unwrap_err();
        assert!(err.is_skip());

        // The holder's claim is untouched
        let stored = registry.get_account(&group, id).await.unwrap();
        assert_eq!(stored.status, AccountStatus::InProgress);
    }

    #[tokio::test]
    async fn policy_failure_restores_prior_status() {
        let (_temp_file, registry, group) = registry_with(Arc::new(FailingPolicy)).await;
        let id = registry
            .insert_account(&group, &NewAccount::new("alice", "pw"))
            .await
            .unwrap();
        registry
            .set_status(&group, id, AccountStatus::Valid)
            .await
            .unwrap();
        let account = registry.get_account(&group, id).await.unwrap();

        assert!(registry.check_status(&group, &account).await.is_err());
        let stored = registry.get_account(&group, id).await.unwrap();
        assert_eq!(stored.status, AccountStatus::Valid);
    }

    #[tokio::test]
    async fn reconcile_walks_every_group() {
        let (_temp_file, registry, group) = registry_with(Arc::new(RandomStatusPolicy)).await;
        let other = GroupName::parse("grpB").unwrap();
        registry.db.create_group(&other).await.unwrap();

        let a = registry
            .insert_account(&group, &NewAccount::new("a", "1"))
            .await
            .unwrap();
        let b = registry
            .insert_account(&other, &NewAccount::new("b", "2"))
            .await
            .unwrap();
        registry.claim(&group, a).await.unwrap();
        registry.claim(&other, b).await.unwrap();

        assert_eq!(registry.reconcile().await.unwrap(), 2);
        assert_eq!(
            registry.get_account(&other, b).await.unwrap().status,
            AccountStatus::Unchecked
        );
    }
}
