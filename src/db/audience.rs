//! Audience-pool operations: growth, listing and atomic allocation.

use crate::types::{GroupName, PoolStats};
use crate::{Error, Result};

use super::{AudienceIdentifier, Database, group_query_error};

// One bind variable per identifier, under SQLITE_MAX_VARIABLE_NUMBER (999)
const MAX_IDENTIFIERS_PER_INSERT: usize = 500;

impl Database {
    /// Add one identifier to the pool
    ///
    /// Duplicate values are ignored. Returns whether a new row was inserted.
    pub async fn add_identifier(&self, group: &GroupName, value: &str) -> Result<bool> {
        let result = sqlx::query(&format!(
            r#"INSERT OR IGNORE INTO "{}" (audience_id) VALUES (?)"#,
            group.audience_table()
        ))
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to add identifier", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Add many identifiers in one transaction, returning how many were new
    ///
    /// Either every chunk lands or none does; a caller that gives up midway
    /// leaves the pool untouched.
    pub async fn add_identifiers<S: AsRef<str>>(&self, group: &GroupName, values: &[S]) -> Result<u64> {
        if values.is_empty() {
            return Ok(0);
        }

        let table = group.audience_table();
        let mut tx = self.begin_immediate().await?;

        let result = async {
            let mut added = 0;
            for chunk in values.chunks(MAX_IDENTIFIERS_PER_INSERT) {
                let mut query_builder = sqlx::QueryBuilder::new(format!(
                    r#"INSERT OR IGNORE INTO "{}" (audience_id) "#,
                    table
                ));
                query_builder.push_values(chunk, |mut b, value| {
                    b.push_bind(value.as_ref());
                });

                let inserted = query_builder
                    .build()
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| group_query_error(group, "Failed to add identifiers", e))?;
                added += inserted.rows_affected();
            }
            Ok::<_, Error>(added)
        }
        .await;

        Self::finish_transaction(tx, result).await
    }

    /// All identifiers not yet handed out, oldest first
    pub async fn list_unused_identifiers(&self, group: &GroupName) -> Result<Vec<AudienceIdentifier>> {
        sqlx::query_as::<_, AudienceIdentifier>(&format!(
            r#"SELECT id, audience_id, used FROM "{}" WHERE used = 0 ORDER BY id ASC"#,
            group.audience_table()
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to list unused identifiers", e))
    }

    /// Every identifier in the pool, oldest first
    pub async fn list_all_identifiers(&self, group: &GroupName) -> Result<Vec<AudienceIdentifier>> {
        sqlx::query_as::<_, AudienceIdentifier>(&format!(
            r#"SELECT id, audience_id, used FROM "{}" ORDER BY id ASC"#,
            group.audience_table()
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to list identifiers", e))
    }

    /// Flag an identifier as used
    ///
    /// Re-marking an already-used identifier is a no-op. Fails with
    /// [`Error::NotFound`] if the value is not in the pool.
    pub async fn mark_identifier_used(&self, group: &GroupName, value: &str) -> Result<()> {
        let result = sqlx::query(&format!(
            r#"UPDATE "{}" SET used = 1 WHERE audience_id = ?"#,
            group.audience_table()
        ))
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to mark identifier used", e))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "identifier '{}' in group '{}'",
                value, group
            )));
        }
        Ok(())
    }

    /// Select one unused identifier at random and flag it used
    ///
    /// The select and the flag flip are one statement, so two concurrent
    /// callers can never be handed the same identifier. Returns `None` when
    /// the pool has no unused identifier left.
    pub async fn claim_unused_identifier(&self, group: &GroupName) -> Result<Option<String>> {
        let table = group.audience_table();
        sqlx::query_scalar(&format!(
            r#"
            UPDATE "{table}"
            SET used = 1
            WHERE id = (SELECT id FROM "{table}" WHERE used = 0 ORDER BY RANDOM() LIMIT 1)
            RETURNING audience_id
            "#
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to claim identifier", e))
    }

    /// Pool size and number of unused identifiers
    pub async fn pool_stats(&self, group: &GroupName) -> Result<PoolStats> {
        let (total, unused): (i64, i64) = sqlx::query_as(&format!(
            r#"SELECT COUNT(*), COALESCE(SUM(CASE WHEN used = 0 THEN 1 ELSE 0 END), 0) FROM "{}""#,
            group.audience_table()
        ))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| group_query_error(group, "Failed to read pool stats", e))?;

        Ok(PoolStats {
            total: total.max(0) as u64,
            unused: unused.max(0) as u64,
        })
    }
}
