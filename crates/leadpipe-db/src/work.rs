//! Pending-work selection for the spend-capped stages.
//!
//! Each stage's "already done" marker is filtered in SQL so a batch only
//! ever sees items it still has to pay for. A lead attributed to several
//! jobs in scope is selected once.

use chrono::NaiveDate;
use sqlx::PgPool;

use crate::DbError;

/// Which job results a stage batch works over.
#[derive(Debug, Clone, Copy)]
pub struct WorkScope<'a> {
    pub job_ids: &'a [i64],
    /// When set, only these leads are considered.
    pub lead_ids: Option<&'a [i64]>,
}

/// A lead whose primary contact still needs a verification attempt.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VerificationWorkRow {
    pub lead_id: i64,
    pub job_id: i64,
    pub contact_id: i64,
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

/// A lead awaiting enrichment or an ads scan.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeadWorkRow {
    pub lead_id: i64,
    pub job_id: i64,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub website: Option<String>,
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

const VERIFICATION_FILTER: &str = "FROM job_results jr \
     JOIN contacts c ON c.id = jr.primary_contact_id \
     JOIN leads l ON l.id = jr.lead_id \
     WHERE jr.job_id = ANY($1) \
       AND ($2::BIGINT[] IS NULL OR jr.lead_id = ANY($2)) \
       AND c.verification_attempted_at IS NULL";

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_verification(
    pool: &PgPool,
    scope: WorkScope<'_>,
    limit: i64,
) -> Result<Vec<VerificationWorkRow>, DbError> {
    let sql = format!(
        "SELECT DISTINCT ON (jr.lead_id) \
                jr.lead_id, jr.job_id, c.id AS contact_id, c.full_name, c.first_name, \
                c.last_name, c.email, l.website \
         {VERIFICATION_FILTER} \
         ORDER BY jr.lead_id, jr.job_id \
         LIMIT $3"
    );
    Ok(sqlx::query_as::<_, VerificationWorkRow>(&sql)
        .bind(scope.job_ids)
        .bind(scope.lead_ids)
        .bind(limit)
        .fetch_all(pool)
        .await?)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_pending_verification(
    pool: &PgPool,
    scope: WorkScope<'_>,
) -> Result<i64, DbError> {
    let sql = format!("SELECT COUNT(DISTINCT jr.lead_id) {VERIFICATION_FILTER}");
    Ok(sqlx::query_scalar::<_, i64>(&sql)
        .bind(scope.job_ids)
        .bind(scope.lead_ids)
        .fetch_one(pool)
        .await?)
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

const ENRICHMENT_FILTER: &str = "FROM job_results jr \
     JOIN leads l ON l.id = jr.lead_id \
     WHERE jr.job_id = ANY($1) \
       AND ($2::BIGINT[] IS NULL OR jr.lead_id = ANY($2)) \
       AND NOT EXISTS ( \
         SELECT 1 FROM signals s WHERE s.lead_id = jr.lead_id AND s.signal_type = $3 \
       )";

/// Leads in scope that carry no `marker_signal` yet.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_enrichment(
    pool: &PgPool,
    scope: WorkScope<'_>,
    marker_signal: &str,
    limit: i64,
) -> Result<Vec<LeadWorkRow>, DbError> {
    let sql = format!(
        "SELECT DISTINCT ON (jr.lead_id) \
                jr.lead_id, jr.job_id, l.name, l.address, l.city, l.state, l.website \
         {ENRICHMENT_FILTER} \
         ORDER BY jr.lead_id, jr.job_id \
         LIMIT $4"
    );
    Ok(sqlx::query_as::<_, LeadWorkRow>(&sql)
        .bind(scope.job_ids)
        .bind(scope.lead_ids)
        .bind(marker_signal)
        .bind(limit)
        .fetch_all(pool)
        .await?)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_pending_enrichment(
    pool: &PgPool,
    scope: WorkScope<'_>,
    marker_signal: &str,
) -> Result<i64, DbError> {
    let sql = format!("SELECT COUNT(DISTINCT jr.lead_id) {ENRICHMENT_FILTER}");
    Ok(sqlx::query_scalar::<_, i64>(&sql)
        .bind(scope.job_ids)
        .bind(scope.lead_ids)
        .bind(marker_signal)
        .fetch_one(pool)
        .await?)
}

// ---------------------------------------------------------------------------
// Ads scan
// ---------------------------------------------------------------------------

const ADS_SCAN_FILTER: &str = "FROM job_results jr \
     JOIN leads l ON l.id = jr.lead_id \
     WHERE jr.job_id = ANY($1) \
       AND ($2::BIGINT[] IS NULL OR jr.lead_id = ANY($2)) \
       AND COALESCE(TRIM(l.website), '') <> '' \
       AND NOT EXISTS ( \
         SELECT 1 FROM ads_library_observations o \
         WHERE o.lead_id = jr.lead_id AND o.provider = $3 \
           AND o.period_start = $4 AND o.period_end = $5 \
       )";

/// Leads in scope with a website and no observation for this exact window.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_ads_scan(
    pool: &PgPool,
    scope: WorkScope<'_>,
    provider: &str,
    period: (NaiveDate, NaiveDate),
    limit: i64,
) -> Result<Vec<LeadWorkRow>, DbError> {
    let sql = format!(
        "SELECT DISTINCT ON (jr.lead_id) \
                jr.lead_id, jr.job_id, l.name, l.address, l.city, l.state, l.website \
         {ADS_SCAN_FILTER} \
         ORDER BY jr.lead_id, jr.job_id \
         LIMIT $6"
    );
    Ok(sqlx::query_as::<_, LeadWorkRow>(&sql)
        .bind(scope.job_ids)
        .bind(scope.lead_ids)
        .bind(provider)
        .bind(period.0)
        .bind(period.1)
        .bind(limit)
        .fetch_all(pool)
        .await?)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_pending_ads_scan(
    pool: &PgPool,
    scope: WorkScope<'_>,
    provider: &str,
    period: (NaiveDate, NaiveDate),
) -> Result<i64, DbError> {
    let sql = format!("SELECT COUNT(DISTINCT jr.lead_id) {ADS_SCAN_FILTER}");
    Ok(sqlx::query_scalar::<_, i64>(&sql)
        .bind(scope.job_ids)
        .bind(scope.lead_ids)
        .bind(provider)
        .bind(period.0)
        .bind(period.1)
        .fetch_one(pool)
        .await?)
}
