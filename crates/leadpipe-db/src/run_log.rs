//! Append-only audit trail of batch outcomes per job.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunLogRow {
    pub id: i64,
    pub job_id: i64,
    pub event: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Appends one structured entry to a job's run log.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn append_run_log(
    pool: &PgPool,
    job_id: i64,
    event: &str,
    payload: &serde_json::Value,
) -> Result<i64, DbError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "INSERT INTO job_run_logs (job_id, event, payload) \
         VALUES ($1, $2, $3) \
         RETURNING id",
    )
    .bind(job_id)
    .bind(event)
    .bind(payload)
    .fetch_one(pool)
    .await?)
}

/// Returns a job's run log, oldest first, optionally filtered by event name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_run_logs(
    pool: &PgPool,
    job_id: i64,
    event: Option<&str>,
    limit: i64,
) -> Result<Vec<RunLogRow>, DbError> {
    Ok(sqlx::query_as::<_, RunLogRow>(
        "SELECT id, job_id, event, payload, created_at \
         FROM job_run_logs \
         WHERE job_id = $1 AND ($2::TEXT IS NULL OR event = $2) \
         ORDER BY id \
         LIMIT $3",
    )
    .bind(job_id)
    .bind(event)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}
