//! Database operations for `jobs`: intake, the collection cursor, per-stage
//! spend state, and cancellation.

use chrono::{DateTime, Utc};
use leadpipe_core::{Stage, StageStatus};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const JOB_COLUMNS: &str = "id, public_id, status, failure_reason, plan, target_firm_count, \
     max_searches, searches_executed, allow_reinclude, segment_offset, keyword_offset, \
     progress_count, \
     verification_status, verification_spend_actual, verification_spend_cap, verification_estimate, \
     enrichment_status, enrichment_spend_actual, enrichment_spend_cap, enrichment_estimate, \
     ads_scan_status, ads_scan_spend_actual, ads_scan_spend_cap, ads_scan_estimate, \
     error_message, started_at, finished_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub id: i64,
    pub public_id: Uuid,
    pub status: String,
    pub failure_reason: Option<String>,
    pub plan: serde_json::Value,
    pub target_firm_count: i32,
    pub max_searches: i32,
    pub searches_executed: i32,
    pub allow_reinclude: bool,
    pub segment_offset: i32,
    pub keyword_offset: i32,
    pub progress_count: i32,
    pub verification_status: String,
    pub verification_spend_actual: Decimal,
    pub verification_spend_cap: Option<Decimal>,
    pub verification_estimate: Option<serde_json::Value>,
    pub enrichment_status: String,
    pub enrichment_spend_actual: Decimal,
    pub enrichment_spend_cap: Option<Decimal>,
    pub enrichment_estimate: Option<serde_json::Value>,
    pub ads_scan_status: String,
    pub ads_scan_spend_actual: Decimal,
    pub ads_scan_spend_cap: Option<Decimal>,
    pub ads_scan_estimate: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Spend bookkeeping of one stage, lifted out of a [`JobRow`].
#[derive(Debug, Clone, PartialEq)]
pub struct StageState {
    pub status: String,
    pub spend_actual: Decimal,
    pub spend_cap: Option<Decimal>,
    pub estimate: Option<serde_json::Value>,
}

impl JobRow {
    /// Spend state of a spend-capped stage; `None` for collection.
    #[must_use]
    pub fn stage_state(&self, stage: Stage) -> Option<StageState> {
        let (status, spend_actual, spend_cap, estimate) = match stage {
            Stage::Collect => return None,
            Stage::Verification => (
                &self.verification_status,
                self.verification_spend_actual,
                self.verification_spend_cap,
                &self.verification_estimate,
            ),
            Stage::Enrichment => (
                &self.enrichment_status,
                self.enrichment_spend_actual,
                self.enrichment_spend_cap,
                &self.enrichment_estimate,
            ),
            Stage::AdsScan => (
                &self.ads_scan_status,
                self.ads_scan_spend_actual,
                self.ads_scan_spend_cap,
                &self.ads_scan_estimate,
            ),
        };
        Some(StageState {
            status: status.clone(),
            spend_actual,
            spend_cap,
            estimate: estimate.clone(),
        })
    }
}

pub struct NewJob<'a> {
    pub plan: &'a serde_json::Value,
    pub target_firm_count: i32,
    pub max_searches: i32,
    pub allow_reinclude: bool,
}

/// Cursor and counters written at the end of a collection batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectProgress {
    pub segment_offset: i32,
    pub keyword_offset: i32,
    pub progress_count: i32,
    pub searches_executed: i32,
    pub completed: bool,
}

fn spend_columns(stage: Stage) -> Result<&'static str, DbError> {
    match stage {
        Stage::Collect => Err(DbError::NotSpendCapped(stage)),
        Stage::Verification | Stage::Enrichment | Stage::AdsScan => Ok(stage.as_str()),
    }
}

// ---------------------------------------------------------------------------
// Intake and reads
// ---------------------------------------------------------------------------

/// Creates a job in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_job(pool: &PgPool, job: &NewJob<'_>) -> Result<JobRow, DbError> {
    let sql = format!(
        "INSERT INTO jobs (public_id, plan, target_firm_count, max_searches, allow_reinclude) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {JOB_COLUMNS}"
    );
    let row = sqlx::query_as::<_, JobRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(job.plan)
        .bind(job.target_firm_count)
        .bind(job.max_searches)
        .bind(job.allow_reinclude)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Fetches a job by internal id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matches, or [`DbError::Sqlx`].
pub async fn get_job(pool: &PgPool, id: i64) -> Result<JobRow, DbError> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
    sqlx::query_as::<_, JobRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Fetches a job by its public UUID.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matches, or [`DbError::Sqlx`].
pub async fn get_job_by_public_id(pool: &PgPool, public_id: Uuid) -> Result<JobRow, DbError> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE public_id = $1");
    sqlx::query_as::<_, JobRow>(&sql)
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` jobs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_jobs(pool: &PgPool, limit: i64) -> Result<Vec<JobRow>, DbError> {
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM jobs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    );
    let rows = sqlx::query_as::<_, JobRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Public ids of jobs whose collection is not finished, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_job_ids(pool: &PgPool) -> Result<Vec<Uuid>, DbError> {
    Ok(sqlx::query_scalar::<_, Uuid>(
        "SELECT public_id FROM jobs \
         WHERE status IN ('queued', 'running') \
         ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?)
}

/// Maps public job ids to internal ids. Unknown ids are dropped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn resolve_job_ids(pool: &PgPool, public_ids: &[Uuid]) -> Result<Vec<i64>, DbError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "SELECT id FROM jobs WHERE public_id = ANY($1) ORDER BY id",
    )
    .bind(public_ids)
    .fetch_all(pool)
    .await?)
}

// ---------------------------------------------------------------------------
// Collection cursor
// ---------------------------------------------------------------------------

/// Moves a `queued` job to `running`; `started_at` is only set the first time.
///
/// Returns `false` if the job is already terminal.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_job_running(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE jobs \
         SET status = 'running', started_at = COALESCE(started_at, NOW()), updated_at = NOW() \
         WHERE id = $1 AND status IN ('queued', 'running')",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Persists the cursor and counters of a collection batch.
///
/// Only applies while the job is still `running`, so a cancel that landed
/// mid-batch is not overwritten. Returns whether the write applied.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn save_collect_progress(
    pool: &PgPool,
    id: i64,
    progress: &CollectProgress,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE jobs \
         SET segment_offset = $2, keyword_offset = $3, progress_count = $4, \
             searches_executed = $5, \
             status = CASE WHEN $6 THEN 'completed' ELSE 'running' END, \
             finished_at = CASE WHEN $6 THEN NOW() ELSE finished_at END, \
             updated_at = NOW() \
         WHERE id = $1 AND status = 'running'",
    )
    .bind(id)
    .bind(progress.segment_offset)
    .bind(progress.keyword_offset)
    .bind(progress.progress_count)
    .bind(progress.searches_executed)
    .bind(progress.completed)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Cancels a non-terminal job: `failed` with reason `canceled`.
///
/// Returns the updated row, or `None` if the job was already terminal.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn cancel_job(pool: &PgPool, id: i64) -> Result<Option<JobRow>, DbError> {
    let sql = format!(
        "UPDATE jobs \
         SET status = 'failed', failure_reason = 'canceled', \
             error_message = 'Canceled by user', finished_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND status IN ('queued', 'running') \
         RETURNING {JOB_COLUMNS}"
    );
    Ok(sqlx::query_as::<_, JobRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

// ---------------------------------------------------------------------------
// Spend-capped stages
// ---------------------------------------------------------------------------

/// Marks a stage `running` and records the cap the caller supplied.
///
/// # Errors
///
/// Returns [`DbError::NotSpendCapped`] for the collection stage, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn begin_stage(
    pool: &PgPool,
    id: i64,
    stage: Stage,
    spend_cap: Decimal,
) -> Result<(), DbError> {
    let prefix = spend_columns(stage)?;
    let sql = format!(
        "UPDATE jobs \
         SET {prefix}_status = 'running', {prefix}_spend_cap = $2, updated_at = NOW() \
         WHERE id = $1"
    );
    let result = sqlx::query(&sql)
        .bind(id)
        .bind(spend_cap)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Writes the accumulated spend and resulting status of a stage batch.
///
/// # Errors
///
/// Returns [`DbError::NotSpendCapped`] for the collection stage, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn save_stage_progress(
    pool: &PgPool,
    id: i64,
    stage: Stage,
    spend_actual: Decimal,
    status: StageStatus,
) -> Result<(), DbError> {
    let prefix = spend_columns(stage)?;
    let sql = format!(
        "UPDATE jobs \
         SET {prefix}_spend_actual = $2, {prefix}_status = $3, updated_at = NOW() \
         WHERE id = $1"
    );
    sqlx::query(&sql)
        .bind(id)
        .bind(spend_actual)
        .bind(status.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

/// Stores a cost estimate for a stage.
///
/// The stage status moves to `estimated` only from `idle` or `estimated`;
/// a running or completed stage keeps its status.
///
/// # Errors
///
/// Returns [`DbError::NotSpendCapped`] for the collection stage, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_stage_estimate(
    pool: &PgPool,
    id: i64,
    stage: Stage,
    estimate: &serde_json::Value,
) -> Result<(), DbError> {
    let prefix = spend_columns(stage)?;
    let sql = format!(
        "UPDATE jobs \
         SET {prefix}_estimate = $2, \
             {prefix}_status = CASE WHEN {prefix}_status IN ('idle', 'estimated') \
                                    THEN 'estimated' ELSE {prefix}_status END, \
             updated_at = NOW() \
         WHERE id = $1"
    );
    sqlx::query(&sql)
        .bind(id)
        .bind(estimate)
        .execute(pool)
        .await?;
    Ok(())
}
