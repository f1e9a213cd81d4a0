//! Database operations for `contacts`.

use chrono::{DateTime, Utc};
use leadpipe_core::{EmailSource, EmailStatus};
use sqlx::PgPool;

use crate::DbError;

const CONTACT_COLUMNS: &str = "id, lead_id, full_name, first_name, last_name, title, email, \
     email_status, email_source, verification_attempted_at, email_verified_at, created_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContactRow {
    pub id: i64,
    pub lead_id: i64,
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub email_status: String,
    pub email_source: Option<String>,
    pub verification_attempted_at: Option<DateTime<Utc>>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct NewContact<'a> {
    pub full_name: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub title: Option<&'a str>,
    pub email: Option<&'a str>,
    pub email_status: EmailStatus,
    pub email_source: Option<EmailSource>,
}

/// Outcome of verifying one contact, written back to the contact row.
pub struct ContactVerificationUpdate<'a> {
    pub email: Option<&'a str>,
    pub email_status: EmailStatus,
    pub email_source: Option<EmailSource>,
}

/// Inserts contacts for a lead, skipping people already stored under the
/// same full name. Returns only the newly inserted rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; the batch is rolled back.
pub async fn insert_contacts(
    pool: &PgPool,
    lead_id: i64,
    contacts: &[NewContact<'_>],
) -> Result<Vec<ContactRow>, DbError> {
    let sql = format!(
        "INSERT INTO contacts \
           (lead_id, full_name, first_name, last_name, title, email, email_status, email_source) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (lead_id, full_name) DO NOTHING \
         RETURNING {CONTACT_COLUMNS}"
    );

    let mut tx = pool.begin().await?;
    let mut inserted = Vec::with_capacity(contacts.len());
    for contact in contacts {
        let row = sqlx::query_as::<_, ContactRow>(&sql)
            .bind(lead_id)
            .bind(contact.full_name)
            .bind(contact.first_name)
            .bind(contact.last_name)
            .bind(contact.title)
            .bind(contact.email)
            .bind(contact.email_status.as_str())
            .bind(contact.email_source.map(EmailSource::as_str))
            .fetch_optional(&mut *tx)
            .await?;
        inserted.extend(row);
    }
    tx.commit().await?;
    Ok(inserted)
}

/// A lead's contacts in discovery order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_lead_contacts(
    pool: &PgPool,
    lead_id: i64,
    limit: i64,
) -> Result<Vec<ContactRow>, DbError> {
    let sql = format!(
        "SELECT {CONTACT_COLUMNS} FROM contacts \
         WHERE lead_id = $1 \
         ORDER BY id \
         LIMIT $2"
    );
    Ok(sqlx::query_as::<_, ContactRow>(&sql)
        .bind(lead_id)
        .bind(limit)
        .fetch_all(pool)
        .await?)
}

/// Fetches a contact by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matches, or [`DbError::Sqlx`].
pub async fn get_contact(pool: &PgPool, id: i64) -> Result<ContactRow, DbError> {
    let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1");
    sqlx::query_as::<_, ContactRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Writes a verification outcome onto the contact.
///
/// `email_verified_at` is set only for a `valid` result; the attempt
/// timestamp is always set so the contact is not selected again.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn record_contact_verification(
    pool: &PgPool,
    contact_id: i64,
    update: &ContactVerificationUpdate<'_>,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE contacts SET \
           email = $2, \
           email_status = $3, \
           email_source = $4, \
           verification_attempted_at = NOW(), \
           email_verified_at = CASE WHEN $3 = 'valid' THEN NOW() ELSE email_verified_at END, \
           updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(contact_id)
    .bind(update.email)
    .bind(update.email_status.as_str())
    .bind(update.email_source.map(EmailSource::as_str))
    .execute(pool)
    .await?;
    Ok(())
}

/// Marks a contact as attempted without changing its email fields.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_verification_attempted(pool: &PgPool, contact_id: i64) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE contacts SET verification_attempted_at = NOW(), updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(contact_id)
    .execute(pool)
    .await?;
    Ok(())
}
