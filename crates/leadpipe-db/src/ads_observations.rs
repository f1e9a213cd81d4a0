//! Database operations for `ads_library_observations`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdsObservationRow {
    pub id: i64,
    pub lead_id: i64,
    pub job_id: Option<i64>,
    pub provider: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub advertiser_name: Option<String>,
    pub ads_count_active: i32,
    pub ads_count_in_period: i32,
    pub min_ads: i32,
    pub threshold_match: bool,
    pub first_seen_at: Option<NaiveDate>,
    pub last_seen_at: Option<NaiveDate>,
    pub evidence_url: Option<String>,
    pub provider_response: serde_json::Value,
    pub observed_at: DateTime<Utc>,
}

pub struct NewAdsObservation<'a> {
    pub lead_id: i64,
    pub job_id: i64,
    pub provider: &'a str,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub advertiser_name: Option<&'a str>,
    pub ads_count_active: i32,
    pub ads_count_in_period: i32,
    pub min_ads: i32,
    pub threshold_match: bool,
    pub first_seen_at: Option<NaiveDate>,
    pub last_seen_at: Option<NaiveDate>,
    pub evidence_url: Option<&'a str>,
    pub provider_response: &'a serde_json::Value,
}

/// Records an observation for one `(lead, provider, period)` window.
///
/// Returns `true` when the window had not been observed before.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_ads_observation(
    pool: &PgPool,
    observation: &NewAdsObservation<'_>,
) -> Result<bool, DbError> {
    Ok(sqlx::query_scalar::<_, bool>(
        "INSERT INTO ads_library_observations \
           (lead_id, job_id, provider, period_start, period_end, advertiser_name, \
            ads_count_active, ads_count_in_period, min_ads, threshold_match, \
            first_seen_at, last_seen_at, evidence_url, provider_response) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         ON CONFLICT (lead_id, provider, period_start, period_end) DO UPDATE SET \
           job_id = EXCLUDED.job_id, \
           advertiser_name = EXCLUDED.advertiser_name, \
           ads_count_active = EXCLUDED.ads_count_active, \
           ads_count_in_period = EXCLUDED.ads_count_in_period, \
           min_ads = EXCLUDED.min_ads, \
           threshold_match = EXCLUDED.threshold_match, \
           first_seen_at = EXCLUDED.first_seen_at, \
           last_seen_at = EXCLUDED.last_seen_at, \
           evidence_url = EXCLUDED.evidence_url, \
           provider_response = EXCLUDED.provider_response, \
           observed_at = NOW() \
         RETURNING (xmax = 0) AS is_new",
    )
    .bind(observation.lead_id)
    .bind(observation.job_id)
    .bind(observation.provider)
    .bind(observation.period_start)
    .bind(observation.period_end)
    .bind(observation.advertiser_name)
    .bind(observation.ads_count_active)
    .bind(observation.ads_count_in_period)
    .bind(observation.min_ads)
    .bind(observation.threshold_match)
    .bind(observation.first_seen_at)
    .bind(observation.last_seen_at)
    .bind(observation.evidence_url)
    .bind(observation.provider_response)
    .fetch_one(pool)
    .await?)
}

/// All observations of a lead, newest window first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_lead_ads_observations(
    pool: &PgPool,
    lead_id: i64,
) -> Result<Vec<AdsObservationRow>, DbError> {
    Ok(sqlx::query_as::<_, AdsObservationRow>(
        "SELECT id, lead_id, job_id, provider, period_start, period_end, advertiser_name, \
                ads_count_active, ads_count_in_period, min_ads, threshold_match, \
                first_seen_at, last_seen_at, evidence_url, provider_response, observed_at \
         FROM ads_library_observations \
         WHERE lead_id = $1 \
         ORDER BY period_end DESC, id DESC",
    )
    .bind(lead_id)
    .fetch_all(pool)
    .await?)
}
