use chrono::{DateTime, Utc};
use leadpipe_core::EmailStatus;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmailVerificationRow {
    pub id: i64,
    pub contact_id: Option<i64>,
    pub email: String,
    pub provider: String,
    pub status: String,
    pub confidence: Option<f64>,
    pub provider_response: serde_json::Value,
    pub verified_at: DateTime<Utc>,
}

pub struct NewEmailVerification<'a> {
    pub contact_id: i64,
    pub email: &'a str,
    pub provider: &'a str,
    pub status: EmailStatus,
    pub confidence: Option<f64>,
    pub provider_response: &'a serde_json::Value,
}

/// Records a verifier result keyed by `(email, provider)`; a repeat check
/// of the same address overwrites the earlier result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_email_verification(
    pool: &PgPool,
    verification: &NewEmailVerification<'_>,
) -> Result<i64, DbError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "INSERT INTO email_verifications \
           (contact_id, email, provider, status, confidence, provider_response) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (email, provider) DO UPDATE SET \
           contact_id = EXCLUDED.contact_id, \
           status = EXCLUDED.status, \
           confidence = EXCLUDED.confidence, \
           provider_response = EXCLUDED.provider_response, \
           verified_at = NOW() \
         RETURNING id",
    )
    .bind(verification.contact_id)
    .bind(verification.email)
    .bind(verification.provider)
    .bind(verification.status.as_str())
    .bind(verification.confidence)
    .bind(verification.provider_response)
    .fetch_one(pool)
    .await?)
}

/// Verification attempts recorded for a contact, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_contact_verifications(
    pool: &PgPool,
    contact_id: i64,
) -> Result<Vec<EmailVerificationRow>, DbError> {
    Ok(sqlx::query_as::<_, EmailVerificationRow>(
        "SELECT id, contact_id, email, provider, status, confidence, provider_response, verified_at \
         FROM email_verifications \
         WHERE contact_id = $1 \
         ORDER BY id",
    )
    .bind(contact_id)
    .fetch_all(pool)
    .await?)
}
