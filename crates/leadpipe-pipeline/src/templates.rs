//! Saved plans: store a plan under a name and launch jobs from it later.

use chrono::{DateTime, Utc};
use leadpipe_core::JobPlan;
use leadpipe_db::{DbError, JobTemplateRow};
use serde::Serialize;
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::jobs::{create_job, JobView};
use crate::zips::fill_plan_zips;

const MAX_TEMPLATE_LIMIT: i64 = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub plan: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<JobTemplateRow> for TemplateView {
    fn from(row: JobTemplateRow) -> Self {
        Self {
            id: row.public_id,
            name: row.name,
            description: row.description,
            plan: row.plan,
            created_at: row.created_at,
        }
    }
}

/// Stores `plan` as a named template.
///
/// A state-only zip sweep gets its ZIPs filled first, so every saved
/// template can drive a job as stored.
///
/// # Errors
///
/// - [`PipelineError::Validation`] for a blank name or a plan that cannot
///   drive a job.
/// - [`PipelineError::Upstream`] if ZIPs are needed and cannot be fetched.
/// - [`PipelineError::Db`] if the insert fails.
pub async fn save_template(
    ctx: &PipelineContext,
    name: &str,
    description: Option<&str>,
    plan: JobPlan,
) -> Result<TemplateView, PipelineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PipelineError::Validation(
            "template name is required".to_string(),
        ));
    }
    let description = description.map(str::trim).filter(|d| !d.is_empty());

    let plan = fill_plan_zips(ctx, plan).await?.validated()?;
    let plan_json = serde_json::to_value(&plan)
        .map_err(|e| PipelineError::Validation(format!("plan is not serializable: {e}")))?;

    let row = leadpipe_db::insert_job_template(ctx.pool(), name, description, &plan_json).await?;
    tracing::info!(template = %row.public_id, name, "template saved");
    Ok(TemplateView::from(row))
}

/// Active templates, newest first.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if the query fails.
pub async fn list_templates(
    ctx: &PipelineContext,
    limit: i64,
) -> Result<Vec<TemplateView>, PipelineError> {
    let rows =
        leadpipe_db::list_active_job_templates(ctx.pool(), limit.clamp(1, MAX_TEMPLATE_LIMIT))
            .await?;
    Ok(rows.into_iter().map(TemplateView::from).collect())
}

/// Creates a new job from a saved template's plan.
///
/// # Errors
///
/// - [`PipelineError::NotFound`] for an unknown or retired template.
/// - [`PipelineError::Validation`] if the stored plan no longer parses.
/// - Any error from [`create_job`].
pub async fn create_job_from_template(
    ctx: &PipelineContext,
    template_id: Uuid,
) -> Result<JobView, PipelineError> {
    let row = leadpipe_db::get_job_template_by_public_id(ctx.pool(), template_id)
        .await
        .map_err(|e| match e {
            DbError::NotFound => PipelineError::NotFound(format!("template {template_id}")),
            other => PipelineError::Db(other),
        })?;

    let plan: JobPlan = serde_json::from_value(row.plan).map_err(|e| {
        PipelineError::Validation(format!("template {template_id} has an invalid plan: {e}"))
    })?;
    let plan = fill_plan_zips(ctx, plan).await?;

    let job = create_job(ctx.pool(), plan).await?;
    tracing::info!(template = %template_id, job = %job.id, "job launched from template");
    Ok(job)
}
