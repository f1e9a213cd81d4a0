//! Database operations for `leads`.

use chrono::{DateTime, Utc};
use leadpipe_core::LeadCandidate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const LEAD_COLUMNS: &str = "id, public_id, name, address, city, state, zip, phone, website, \
     external_place_id, maps_url, identity_hash, source_query, source_geo_label, \
     contact_form_url, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeadRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub external_place_id: Option<String>,
    pub maps_url: Option<String>,
    pub identity_hash: String,
    pub source_query: Option<String>,
    pub source_geo_label: Option<String>,
    pub contact_form_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Looks up a lead by external place id, falling back to the identity hash.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_existing_lead_id(
    pool: &PgPool,
    external_place_id: Option<&str>,
    identity_hash: &str,
) -> Result<Option<i64>, DbError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "SELECT id FROM leads \
         WHERE external_place_id = $1 OR identity_hash = $2 \
         ORDER BY (external_place_id = $1) DESC NULLS LAST, id \
         LIMIT 1",
    )
    .bind(external_place_id)
    .bind(identity_hash)
    .fetch_optional(pool)
    .await?)
}

/// Inserts or refreshes a lead and returns its id.
///
/// With `existing_id` the row is updated in place and keeps its identity;
/// fields the candidate lacks are left as stored. Without it a new row is
/// inserted, merging on `external_place_id` if one races in.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if `existing_id` no longer exists, or
/// [`DbError::Sqlx`] on query failure.
pub async fn upsert_lead(
    pool: &PgPool,
    existing_id: Option<i64>,
    candidate: &LeadCandidate,
    identity_hash: &str,
) -> Result<i64, DbError> {
    if let Some(id) = existing_id {
        return sqlx::query_scalar::<_, i64>(
            "UPDATE leads SET \
               name = $2, \
               address = COALESCE($3, address), \
               city = COALESCE($4, city), \
               state = COALESCE($5, state), \
               zip = COALESCE($6, zip), \
               phone = COALESCE($7, phone), \
               website = COALESCE($8, website), \
               external_place_id = CASE \
                 WHEN external_place_id IS NULL \
                      AND NOT EXISTS (SELECT 1 FROM leads o WHERE o.external_place_id = $9) \
                 THEN $9 ELSE external_place_id END, \
               maps_url = COALESCE($10, maps_url), \
               source_query = $11, \
               source_geo_label = $12, \
               updated_at = NOW() \
             WHERE id = $1 \
             RETURNING id",
        )
        .bind(id)
        .bind(&candidate.name)
        .bind(candidate.address.as_deref())
        .bind(candidate.city.as_deref())
        .bind(candidate.state.as_deref())
        .bind(candidate.zip.as_deref())
        .bind(candidate.phone.as_deref())
        .bind(candidate.website.as_deref())
        .bind(candidate.external_place_id.as_deref())
        .bind(candidate.maps_url.as_deref())
        .bind(&candidate.source_query)
        .bind(&candidate.source_geo_label)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound);
    }

    Ok(sqlx::query_scalar::<_, i64>(
        "INSERT INTO leads \
           (public_id, name, address, city, state, zip, phone, website, \
            external_place_id, maps_url, identity_hash, source_query, source_geo_label) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         ON CONFLICT (external_place_id) DO UPDATE SET \
           name = EXCLUDED.name, \
           address = COALESCE(EXCLUDED.address, leads.address), \
           phone = COALESCE(EXCLUDED.phone, leads.phone), \
           website = COALESCE(EXCLUDED.website, leads.website), \
           updated_at = NOW() \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(&candidate.name)
    .bind(candidate.address.as_deref())
    .bind(candidate.city.as_deref())
    .bind(candidate.state.as_deref())
    .bind(candidate.zip.as_deref())
    .bind(candidate.phone.as_deref())
    .bind(candidate.website.as_deref())
    .bind(candidate.external_place_id.as_deref())
    .bind(candidate.maps_url.as_deref())
    .bind(identity_hash)
    .bind(&candidate.source_query)
    .bind(&candidate.source_geo_label)
    .fetch_one(pool)
    .await?)
}

/// Records the contact form discovered by the crawler.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_contact_form_url(pool: &PgPool, lead_id: i64, url: &str) -> Result<(), DbError> {
    sqlx::query("UPDATE leads SET contact_form_url = $2, updated_at = NOW() WHERE id = $1")
        .bind(lead_id)
        .bind(url)
        .execute(pool)
        .await?;
    Ok(())
}

/// Sets the phone from a crawled page when the directory listing had none.
///
/// Returns `true` if the lead was updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn fill_missing_phone(pool: &PgPool, lead_id: i64, phone: &str) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE leads SET phone = $2, updated_at = NOW() \
         WHERE id = $1 AND (phone IS NULL OR btrim(phone) = '')",
    )
    .bind(lead_id)
    .bind(phone)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Fetches a lead by internal id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matches, or [`DbError::Sqlx`].
pub async fn get_lead(pool: &PgPool, id: i64) -> Result<LeadRow, DbError> {
    let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1");
    sqlx::query_as::<_, LeadRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Maps public lead ids to internal ids. Unknown ids are dropped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn resolve_lead_ids(pool: &PgPool, public_ids: &[Uuid]) -> Result<Vec<i64>, DbError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "SELECT id FROM leads WHERE public_id = ANY($1) ORDER BY id",
    )
    .bind(public_ids)
    .fetch_all(pool)
    .await?)
}
