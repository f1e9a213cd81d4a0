use std::time::Duration;

use leadpipe_core::Stage;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/leadpipe-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &leadpipe_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("stage '{0}' has no spend columns")]
    NotSpendCapped(Stage),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// Batches hold one connection for their advisory lock while issuing queries
/// on others, so `max_connections` below 2 will deadlock a batch.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections.max(2))
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table may not exist yet on a fresh database;
    // treat absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}


pub mod ads_observations;
pub mod contacts;
pub mod job_results;
pub mod jobs;
pub mod leads;
pub mod locks;
pub mod run_log;
pub mod signals;
pub mod templates;
pub mod verifications;
pub mod work;

pub use ads_observations::{
    list_lead_ads_observations, upsert_ads_observation, AdsObservationRow, NewAdsObservation,
};
pub use contacts::{
    get_contact, insert_contacts, list_lead_contacts, mark_verification_attempted,
    record_contact_verification, ContactRow, ContactVerificationUpdate, NewContact,
};
pub use job_results::{
    count_job_results, list_job_results, set_primary_contact_in_scope, upsert_job_result,
    JobResultRow,
};
pub use jobs::{
    begin_stage, cancel_job, create_job, get_job, get_job_by_public_id, list_active_job_ids,
    list_jobs, mark_job_running, record_stage_estimate, resolve_job_ids, save_collect_progress,
    save_stage_progress, CollectProgress, JobRow, NewJob, StageState,
};
pub use leads::{
    fill_missing_phone, find_existing_lead_id, get_lead, resolve_lead_ids, set_contact_form_url,
    upsert_lead, LeadRow,
};
pub use locks::{try_lock_stage, StageLock};
pub use run_log::{append_run_log, list_run_logs, RunLogRow};
pub use signals::{insert_signals, list_lead_signals, NewSignal, SignalRow};
pub use templates::{
    get_job_template_by_public_id, insert_job_template, list_active_job_templates,
    JobTemplateRow,
};
pub use verifications::{
    list_contact_verifications, upsert_email_verification, EmailVerificationRow,
    NewEmailVerification,
};
pub use work::{
    count_pending_ads_scan, count_pending_enrichment, count_pending_verification,
    list_pending_ads_scan, list_pending_enrichment, list_pending_verification, LeadWorkRow,
    VerificationWorkRow, WorkScope,
};
