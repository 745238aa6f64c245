//! Account CRUD, message counters and the busy claim.

use crate::types::{Account, AccountId, AccountStatus, GroupName};
use crate::{Error, Result};

use super::{AccountRow, Database, NewAccount, group_query_error};

const ACCOUNT_COLUMNS: &str = "id, username, password, ua, cookie, device, status_account, \
                               messages_total, messages_day, messages_run, color";

// Stays well under SQLITE_MAX_VARIABLE_NUMBER (999)
const MAX_IDS_PER_STATEMENT: usize = 500;

// Each account uses 5 bind variables
const MAX_ACCOUNTS_PER_INSERT: usize = 199;

impl Database {
    /// Insert a single account with default status and zero counters
    pub async fn insert_account(&self, group: &GroupName, account: &NewAccount) -> Result<AccountId> {
        let result = sqlx::query(&format!(
            r#"INSERT INTO "{}" (username, password, ua, cookie, device) VALUES (?, ?, ?, ?, ?)"#,
            group.accounts_table()
        ))
        .bind(&account.username)
        .bind(&account.password)
        .bind(&account.user_agent)
        .bind(&account.cookie)
        .bind(&account.device)
        .execute(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to insert account", e))?;

        Ok(AccountId(result.last_insert_rowid()))
    }

    /// Insert several accounts in one transaction, returning their ids in input order
    ///
    /// Rows go out in multi-row `INSERT`s chunked under SQLite's bind limit.
    pub async fn insert_accounts(
        &self,
        group: &GroupName,
        accounts: &[NewAccount],
    ) -> Result<Vec<AccountId>> {
        if accounts.is_empty() {
            return Ok(Vec::new());
        }

        let table = group.accounts_table();
        let mut tx = self.begin_immediate().await?;

        let result = async {
            let mut ids = Vec::with_capacity(accounts.len());
            for chunk in accounts.chunks(MAX_ACCOUNTS_PER_INSERT) {
                let mut query_builder = sqlx::QueryBuilder::new(format!(
                    r#"INSERT INTO "{}" (username, password, ua, cookie, device) "#,
                    table
                ));
                query_builder.push_values(chunk, |mut b, account| {
                    b.push_bind(&account.username)
                        .push_bind(&account.password)
                        .push_bind(&account.user_agent)
                        .push_bind(&account.cookie)
                        .push_bind(&account.device);
                });
                query_builder.push(" RETURNING id");

                let mut chunk_ids: Vec<i64> = query_builder
                    .build_query_scalar()
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(|e| group_query_error(group, "Failed to insert accounts", e))?;
                // Rowids are handed out in VALUES order; RETURNING order is unspecified
                chunk_ids.sort_unstable();
                ids.extend(chunk_ids.into_iter().map(AccountId));
            }
            Ok::<_, Error>(ids)
        }
        .await;

        Self::finish_transaction(tx, result).await
    }

    /// Get an account by ID
    pub async fn get_account(&self, group: &GroupName, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"SELECT {} FROM "{}" WHERE id = ?"#,
            ACCOUNT_COLUMNS,
            group.accounts_table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to get account", e))?;

        Ok(row.map(Account::from))
    }

    /// Snapshot of all accounts in insertion order
    pub async fn list_accounts(&self, group: &GroupName) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            r#"SELECT {} FROM "{}" ORDER BY id ASC"#,
            ACCOUNT_COLUMNS,
            group.accounts_table()
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to list accounts", e))?;

        Ok(rows.into_iter().map(Account::from).collect())
    }

    /// Set an account's status and presentation tag
    pub async fn update_account_status(
        &self,
        group: &GroupName,
        id: AccountId,
        status: AccountStatus,
        tag: &str,
    ) -> Result<()> {
        let result = sqlx::query(&format!(
            r#"UPDATE "{}" SET status_account = ?, color = ? WHERE id = ?"#,
            group.accounts_table()
        ))
        .bind(status.as_db())
        .bind(tag)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to update account status", e))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("account {} in group '{}'", id, group)));
        }
        Ok(())
    }

    /// Add `delta` to the lifetime, period and run counters of one account
    pub async fn bump_message_counters(
        &self,
        group: &GroupName,
        id: AccountId,
        delta: i64,
    ) -> Result<()> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE "{}"
            SET messages_total = messages_total + ?,
                messages_day = messages_day + ?,
                messages_run = messages_run + ?
            WHERE id = ?
            "#,
            group.accounts_table()
        ))
        .bind(delta)
        .bind(delta)
        .bind(delta)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to bump message counters", e))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("account {} in group '{}'", id, group)));
        }
        Ok(())
    }

    /// Zero `messages_run` for the given accounts
    pub async fn reset_run_counters(&self, group: &GroupName, ids: &[AccountId]) -> Result<u64> {
        let mut reset = 0;
        for chunk in ids.chunks(MAX_IDS_PER_STATEMENT) {
            let mut query_builder = sqlx::QueryBuilder::new(format!(
                r#"UPDATE "{}" SET messages_run = 0 WHERE id IN ("#,
                group.accounts_table()
            ));
            let mut separated = query_builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            query_builder.push(")");

            let result = query_builder
                .build()
                .execute(&self.pool)
                .await
                .map_err(|e| group_query_error(group, "Failed to reset run counters", e))?;
            reset += result.rows_affected();
        }
        Ok(reset)
    }

    /// Zero `messages_day` for every account in the group
    pub async fn reset_period_counters(&self, group: &GroupName) -> Result<u64> {
        let result = sqlx::query(&format!(
            r#"UPDATE "{}" SET messages_day = 0"#,
            group.accounts_table()
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to reset period counters", e))?;

        Ok(result.rows_affected())
    }

    /// Delete accounts atomically
    ///
    /// Fails with [`Error::AlreadyBusy`] and deletes nothing if any of the
    /// accounts is currently claimed by a task step. Returns the number of
    /// rows removed; ids that do not exist are ignored.
    pub async fn delete_accounts(&self, group: &GroupName, ids: &[AccountId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let table = group.accounts_table();
        let mut tx = self.begin_immediate().await?;

        let result = async {
            for chunk in ids.chunks(MAX_IDS_PER_STATEMENT) {
                let mut query_builder = sqlx::QueryBuilder::new(format!(
                    r#"SELECT id FROM "{}" WHERE status_account = 'in_progress' AND id IN ("#,
                    table
                ));
                let mut separated = query_builder.separated(", ");
                for id in chunk {
                    separated.push_bind(*id);
                }
                query_builder.push(") LIMIT 1");

                let busy: Option<i64> = query_builder
                    .build_query_scalar()
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| group_query_error(group, "Failed to check busy accounts", e))?;
                if let Some(account_id) = busy {
                    return Err(Error::AlreadyBusy {
                        group: group.to_string(),
                        account_id,
                    });
                }
            }

            let mut deleted = 0;
            for chunk in ids.chunks(MAX_IDS_PER_STATEMENT) {
                let mut query_builder =
                    sqlx::QueryBuilder::new(format!(r#"DELETE FROM "{}" WHERE id IN ("#, table));
                let mut separated = query_builder.separated(", ");
                for id in chunk {
                    separated.push_bind(*id);
                }
                query_builder.push(")");

                let result = query_builder
                    .build()
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| group_query_error(group, "Failed to delete accounts", e))?;
                deleted += result.rows_affected();
            }
            Ok::<_, Error>(deleted)
        }
        .await;

        let deleted = Self::finish_transaction(tx, result).await?;
        tracing::info!(group = %group, deleted, "Accounts deleted");
        Ok(deleted)
    }

    /// Atomically claim an account for a task step
    ///
    /// Compare-and-set in one statement: the status flips to `InProgress` only
    /// if it is not already `InProgress`, and the prior status is kept in
    /// `status_before` so the claim can be undone. Returns the prior status.
    pub async fn try_claim_account(
        &self,
        group: &GroupName,
        id: AccountId,
    ) -> Result<AccountStatus> {
        let previous: Option<String> = sqlx::query_scalar(&format!(
            r#"
            UPDATE "{}"
            SET status_before = status_account, status_account = 'in_progress'
            WHERE id = ? AND status_account != 'in_progress'
            RETURNING status_before
            "#,
            group.accounts_table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to claim account", e))?;

        match previous {
            Some(status) => Ok(AccountStatus::from_db(&status)),
            None => {
                // Nothing updated: either someone else holds it or it is gone
                if self.get_account(group, id).await?.is_some() {
                    Err(Error::AlreadyBusy {
                        group: group.to_string(),
                        account_id: id.0,
                    })
                } else {
                    Err(Error::NotFound(format!("account {} in group '{}'", id, group)))
                }
            }
        }
    }

    /// Release a claimed account with its final status and tag
    pub async fn finish_account(
        &self,
        group: &GroupName,
        id: AccountId,
        status: AccountStatus,
    ) -> Result<()> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE "{}"
            SET status_account = ?, color = ?, status_before = NULL
            WHERE id = ? AND status_account = 'in_progress'
            "#,
            group.accounts_table()
        ))
        .bind(status.as_db())
        .bind(status.display_tag())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to finish account", e))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "claimed account {} in group '{}'",
                id, group
            )));
        }
        Ok(())
    }

    /// Release a claimed account back to the status it had before the claim
    pub async fn restore_account(&self, group: &GroupName, id: AccountId) -> Result<()> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE "{}"
            SET status_account = COALESCE(status_before, 'unchecked'), status_before = NULL
            WHERE id = ? AND status_account = 'in_progress'
            "#,
            group.accounts_table()
        ))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to restore account", e))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "claimed account {} in group '{}'",
                id, group
            )));
        }
        Ok(())
    }

    /// Restore every `InProgress` account of a group to its pre-claim status
    ///
    /// Only safe when no task is running, i.e. at startup after a crash.
    pub async fn reconcile_in_progress(&self, group: &GroupName) -> Result<u64> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE "{}"
            SET status_account = COALESCE(status_before, 'unchecked'), status_before = NULL
            WHERE status_account = 'in_progress'
            "#,
            group.accounts_table()
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to reconcile accounts", e))?;

        Ok(result.rows_affected())
    }
}
