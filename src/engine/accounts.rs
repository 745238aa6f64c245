//! Account operations exposed to the foreground.

use std::io::Read;

use crate::db::NewAccount;
use crate::error::Result;
use crate::registry::ImportReport;
use crate::types::{Account, AccountId, AccountStatus, GroupName};

use super::TaskEngine;

impl TaskEngine {
    /// Insert one account into a group
    pub async fn insert_account(&self, group: &str, account: &NewAccount) -> Result<AccountId> {
        let group = GroupName::parse(group)?;
        self.registry.insert_account(&group, account).await
    }

    /// Import accounts from header-keyed CSV (`username`, `password`, optional `ua`, `cookie`, `device`)
    pub async fn import_accounts_csv<R: Read + Send>(&self, group: &str, reader: R) -> Result<ImportReport> {
        let group = GroupName::parse(group)?;
        self.registry.import_csv(&group, reader).await
    }

    /// Fill a group with `count` synthetic accounts
    pub async fn generate_accounts(&self, group: &str, count: usize) -> Result<Vec<AccountId>> {
        let group = GroupName::parse(group)?;
        self.registry.generate_accounts(&group, count).await
    }

    /// Get one account
    pub async fn get_account(&self, group: &str, id: AccountId) -> Result<Account> {
        let group = GroupName::parse(group)?;
        self.registry.get_account(&group, id).await
    }

    /// Point-in-time snapshot of a group's accounts, in insertion order
    ///
    /// The snapshot is also what [`start`](Self::start) takes as task input.
    pub async fn list_accounts(&self, group: &str) -> Result<Vec<Account>> {
        let group = GroupName::parse(group)?;
        self.registry.list_accounts(&group).await
    }

    /// Set an account's status directly (presentation tag follows the status)
    pub async fn update_account_status(
        &self,
        group: &str,
        id: AccountId,
        status: AccountStatus,
    ) -> Result<()> {
        let group = GroupName::parse(group)?;
        self.registry.set_status(&group, id, status).await
    }

    /// Run a single status check outside of a task invocation
    pub async fn check_account_status(&self, group: &str, id: AccountId) -> Result<AccountStatus> {
        let group = GroupName::parse(group)?;
        let account = self.registry.get_account(&group, id).await?;
        self.registry.check_status(&group, &account).await
    }

    /// Delete accounts; refused with `AlreadyBusy` if any of them is claimed by a task step
    pub async fn delete_accounts(&self, group: &str, ids: &[AccountId]) -> Result<u64> {
        let group = GroupName::parse(group)?;
        self.registry.delete_accounts(&group, ids).await
    }

    /// Zero the period message counter of every account in a group
    pub async fn reset_period_counters(&self, group: &str) -> Result<u64> {
        let group = GroupName::parse(group)?;
        self.registry.reset_period_counters(&group).await
    }
}
