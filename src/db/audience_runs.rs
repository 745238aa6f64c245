//! Audience-populate run summaries (`parsed_audience` table).

use crate::types::AudienceRun;
use crate::{Error, Result};

use super::{AudienceRunRow, Database};

impl Database {
    /// Record the outcome of one audience-populate run
    pub async fn insert_audience_run(
        &self,
        audience_name: &str,
        total_audience_count: i64,
        processed_audience_count: i64,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO parsed_audience (
                audience_name, total_audience_count, processed_audience_count, audience_date
            )
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(audience_name)
        .bind(total_audience_count)
        .bind(processed_audience_count)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(result.last_insert_rowid())
    }

    /// All run summaries, newest first
    pub async fn list_audience_runs(&self) -> Result<Vec<AudienceRun>> {
        let rows = sqlx::query_as::<_, AudienceRunRow>(
            r#"
            SELECT id, audience_name, total_audience_count, processed_audience_count, audience_date
            FROM parsed_audience
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlx)?;

        Ok(rows.into_iter().map(AudienceRun::from).collect())
    }
}
