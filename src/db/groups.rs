//! Group registry: creating and dropping a group's table pair.

use crate::error::DatabaseError;
use crate::types::GroupName;
use crate::{Error, Result};

use super::Database;

impl Database {
    /// Create a group's account table and audience-pool table
    ///
    /// Both tables and the registry row are created in one transaction, so a
    /// failure leaves no new state behind. A name that already exists, in any
    /// letter case, is rejected with [`Error::InvalidName`].
    pub async fn create_group(&self, group: &GroupName) -> Result<()> {
        let mut tx = self.begin_immediate().await?;

        let result = async {
            let existing: Option<String> =
                sqlx::query_scalar("SELECT name FROM groups WHERE name = ?")
                    .bind(group.as_str())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(Error::Sqlx)?;
            if let Some(existing) = existing {
                return Err(Error::invalid_name(
                    group.as_str(),
                    format!("group '{}' already exists", existing),
                ));
            }

            sqlx::query(&format!(
                r#"
                CREATE TABLE "{}" (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL,
                    password TEXT NOT NULL,
                    ua TEXT NOT NULL DEFAULT '',
                    cookie TEXT NOT NULL DEFAULT '',
                    device TEXT NOT NULL DEFAULT '',
                    status_account TEXT NOT NULL DEFAULT 'unchecked',
                    messages_total INTEGER NOT NULL DEFAULT 0,
                    messages_day INTEGER NOT NULL DEFAULT 0,
                    messages_run INTEGER NOT NULL DEFAULT 0,
                    color TEXT NOT NULL DEFAULT '',
                    status_before TEXT
                )
                "#,
                group.accounts_table()
            ))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to create account table for group '{}': {}",
                    group, e
                )))
            })?;

            sqlx::query(&format!(
                r#"
                CREATE TABLE "{}" (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    audience_id TEXT NOT NULL UNIQUE,
                    used INTEGER NOT NULL DEFAULT 0
                )
                "#,
                group.audience_table()
            ))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to create audience table for group '{}': {}",
                    group, e
                )))
            })?;

            sqlx::query("INSERT INTO groups (name, created_at) VALUES (?, ?)")
                .bind(group.as_str())
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *tx)
                .await
                .map_err(Error::Sqlx)?;

            Ok::<(), Error>(())
        }
        .await;

        Self::finish_transaction(tx, result).await?;
        tracing::info!(group = %group, "Group created");
        Ok(())
    }

    /// Drop a group's tables and registry row
    ///
    /// Fails with [`Error::NotFound`] if the group does not exist.
    pub async fn drop_group(&self, group: &GroupName) -> Result<()> {
        let mut tx = self.begin_immediate().await?;

        let result = async {
            let removed = sqlx::query("DELETE FROM groups WHERE name = ?")
                .bind(group.as_str())
                .execute(&mut *tx)
                .await
                .map_err(Error::Sqlx)?;
            if removed.rows_affected() == 0 {
                return Err(Error::NotFound(format!("group '{}'", group)));
            }

            for table in [group.accounts_table(), group.audience_table()] {
                sqlx::query(&format!(r#"DROP TABLE IF EXISTS "{}""#, table))
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::QueryFailed(format!(
                            "Failed to drop table {}: {}",
                            table, e
                        )))
                    })?;
            }

            Ok::<(), Error>(())
        }
        .await;

        Self::finish_transaction(tx, result).await?;
        tracing::info!(group = %group, "Group dropped");
        Ok(())
    }

    /// List all groups in creation order
    pub async fn list_groups(&self) -> Result<Vec<GroupName>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM groups ORDER BY created_at, rowid")
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Sqlx)?;

        names.iter().map(|name| GroupName::parse(name)).collect()
    }

    /// Check whether a group exists (case-insensitive)
    pub async fn group_exists(&self, group: &GroupName) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM groups WHERE name = ?")
            .bind(group.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Sqlx)?;

        Ok(count > 0)
    }

    /// Fail with [`Error::NotFound`] unless the group exists
    pub async fn require_group(&self, group: &GroupName) -> Result<()> {
        if self.group_exists(group).await? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("group '{}'", group)))
        }
    }
}
