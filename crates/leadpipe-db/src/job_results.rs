//! Database operations for `job_results`, the job ↔ lead attribution table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A job result joined with its lead and primary contact.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobResultRow {
    pub lead_id: i64,
    pub lead_public_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub maps_url: Option<String>,
    pub contact_form_url: Option<String>,
    pub source_geo_label: Option<String>,
    pub primary_contact_id: Option<i64>,
    pub contact_full_name: Option<String>,
    pub contact_title: Option<String>,
    pub contact_email: Option<String>,
    pub contact_email_status: Option<String>,
    pub attributed_at: DateTime<Utc>,
}

/// Attributes a lead to a job. Returns `true` when the row is new.
///
/// An existing row keeps its primary contact unless a new one is supplied.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_job_result(
    pool: &PgPool,
    job_id: i64,
    lead_id: i64,
    primary_contact_id: Option<i64>,
) -> Result<bool, DbError> {
    Ok(sqlx::query_scalar::<_, bool>(
        "INSERT INTO job_results (job_id, lead_id, primary_contact_id) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (job_id, lead_id) DO UPDATE SET \
           primary_contact_id = COALESCE(EXCLUDED.primary_contact_id, job_results.primary_contact_id), \
           updated_at = NOW() \
         RETURNING (xmax = 0) AS is_new",
    )
    .bind(job_id)
    .bind(lead_id)
    .bind(primary_contact_id)
    .fetch_one(pool)
    .await?)
}

/// Number of leads attributed to a job; the authoritative progress count.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_job_results(pool: &PgPool, job_id: i64) -> Result<i64, DbError> {
    Ok(
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM job_results WHERE job_id = $1")
            .bind(job_id)
            .fetch_one(pool)
            .await?,
    )
}

/// Points every in-scope job result of `lead_id` at `contact_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_primary_contact_in_scope(
    pool: &PgPool,
    job_ids: &[i64],
    lead_id: i64,
    contact_id: i64,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE job_results SET primary_contact_id = $3, updated_at = NOW() \
         WHERE job_id = ANY($1) AND lead_id = $2",
    )
    .bind(job_ids)
    .bind(lead_id)
    .bind(contact_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// A page of a job's results in attribution order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_job_results(
    pool: &PgPool,
    job_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<JobResultRow>, DbError> {
    Ok(sqlx::query_as::<_, JobResultRow>(
        "SELECT l.id AS lead_id, l.public_id AS lead_public_id, l.name, l.address, l.city, \
                l.state, l.zip, l.phone, l.website, l.maps_url, l.contact_form_url, \
                l.source_geo_label, jr.primary_contact_id, \
                c.full_name AS contact_full_name, c.title AS contact_title, \
                c.email AS contact_email, c.email_status AS contact_email_status, \
                jr.created_at AS attributed_at \
         FROM job_results jr \
         JOIN leads l ON l.id = jr.lead_id \
         LEFT JOIN contacts c ON c.id = jr.primary_contact_id \
         WHERE jr.job_id = $1 \
         ORDER BY jr.created_at, l.id \
         LIMIT $2 OFFSET $3",
    )
    .bind(job_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?)
}
