//! Saved job plans that can be launched again.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const TEMPLATE_COLUMNS: &str =
    "id, public_id, name, description, plan, is_active, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobTemplateRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub plan: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inserts an active template.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including a blank name.
pub async fn insert_job_template(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    plan: &serde_json::Value,
) -> Result<JobTemplateRow, DbError> {
    let sql = format!(
        "INSERT INTO job_templates (public_id, name, description, plan) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {TEMPLATE_COLUMNS}"
    );
    Ok(sqlx::query_as::<_, JobTemplateRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(plan)
        .fetch_one(pool)
        .await?)
}

/// Active templates, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_job_templates(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<JobTemplateRow>, DbError> {
    let sql = format!(
        "SELECT {TEMPLATE_COLUMNS} FROM job_templates \
         WHERE is_active \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    );
    Ok(sqlx::query_as::<_, JobTemplateRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?)
}

/// Fetches an active template by public id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no active row matches, or [`DbError::Sqlx`].
pub async fn get_job_template_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<JobTemplateRow, DbError> {
    let sql = format!(
        "SELECT {TEMPLATE_COLUMNS} FROM job_templates WHERE public_id = $1 AND is_active"
    );
    sqlx::query_as::<_, JobTemplateRow>(&sql)
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}
