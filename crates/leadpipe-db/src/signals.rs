use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SignalRow {
    pub id: i64,
    pub lead_id: i64,
    pub contact_id: Option<i64>,
    pub signal_type: String,
    pub signal_value: serde_json::Value,
    pub evidence_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewSignal<'a> {
    pub lead_id: i64,
    pub contact_id: Option<i64>,
    pub signal_type: &'a str,
    pub signal_value: serde_json::Value,
    pub evidence_url: Option<&'a str>,
}

/// Appends signals in one transaction. Returns the number written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; none are kept in that case.
pub async fn insert_signals(pool: &PgPool, signals: &[NewSignal<'_>]) -> Result<usize, DbError> {
    if signals.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for signal in signals {
        sqlx::query(
            "INSERT INTO signals (lead_id, contact_id, signal_type, signal_value, evidence_url) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(signal.lead_id)
        .bind(signal.contact_id)
        .bind(signal.signal_type)
        .bind(&signal.signal_value)
        .bind(signal.evidence_url)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(signals.len())
}

/// All signals of a lead, oldest first, optionally filtered by type.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_lead_signals(
    pool: &PgPool,
    lead_id: i64,
    signal_type: Option<&str>,
) -> Result<Vec<SignalRow>, DbError> {
    Ok(sqlx::query_as::<_, SignalRow>(
        "SELECT id, lead_id, contact_id, signal_type, signal_value, evidence_url, created_at \
         FROM signals \
         WHERE lead_id = $1 AND ($2::TEXT IS NULL OR signal_type = $2) \
         ORDER BY id",
    )
    .bind(lead_id)
    .bind(signal_type)
    .fetch_all(pool)
    .await?)
}
