//! Job intake, cancellation, and the read models the API and CLI render.

use chrono::{DateTime, Utc};
use leadpipe_core::{build_geo_segments, JobPlan, Stage};
use leadpipe_db::{JobResultRow, JobRow, NewJob, RunLogRow, SignalRow, StageState};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::spend::load_job;

const MAX_LIST_LIMIT: i64 = 500;

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
    pub status: String,
    pub spend_actual: Decimal,
    pub spend_cap: Option<Decimal>,
    pub estimate: Option<serde_json::Value>,
}

impl From<StageState> for StageView {
    fn from(state: StageState) -> Self {
        Self {
            status: state.status,
            spend_actual: state.spend_actual.normalize(),
            spend_cap: state.spend_cap.map(|cap| cap.normalize()),
            estimate: state.estimate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagesView {
    pub verification: Option<StageView>,
    pub enrichment: Option<StageView>,
    pub ads_scan: Option<StageView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: Uuid,
    pub status: String,
    pub failure_reason: Option<String>,
    pub plan: serde_json::Value,
    pub target_firm_count: i32,
    pub max_searches: i32,
    pub searches_executed: i32,
    pub allow_reinclude: bool,
    pub segment_offset: i32,
    pub keyword_offset: i32,
    pub progress_count: i32,
    pub stages: StagesView,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&JobRow> for JobView {
    fn from(row: &JobRow) -> Self {
        let stage = |s: Stage| row.stage_state(s).map(StageView::from);
        Self {
            id: row.public_id,
            status: row.status.clone(),
            failure_reason: row.failure_reason.clone(),
            plan: row.plan.clone(),
            target_firm_count: row.target_firm_count,
            max_searches: row.max_searches,
            searches_executed: row.searches_executed,
            allow_reinclude: row.allow_reinclude,
            segment_offset: row.segment_offset,
            keyword_offset: row.keyword_offset,
            progress_count: row.progress_count,
            stages: StagesView {
                verification: stage(Stage::Verification),
                enrichment: stage(Stage::Enrichment),
                ads_scan: stage(Stage::AdsScan),
            },
            error_message: row.error_message.clone(),
            started_at: row.started_at,
            finished_at: row.finished_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalView {
    pub signal_type: String,
    pub signal_value: serde_json::Value,
    pub evidence_url: Option<String>,
    pub contact_id: Option<i64>,
}

impl From<SignalRow> for SignalView {
    fn from(row: SignalRow) -> Self {
        Self {
            signal_type: row.signal_type,
            signal_value: row.signal_value,
            evidence_url: row.evidence_url,
            contact_id: row.contact_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryContactView {
    pub id: i64,
    pub full_name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub email_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub lead_id: Uuid,
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
    pub primary_contact: Option<PrimaryContactView>,
    pub signals: Vec<SignalView>,
    pub attributed_at: DateTime<Utc>,
}

impl ResultView {
    fn new(row: JobResultRow, signals: Vec<SignalRow>) -> Self {
        let primary_contact = row.primary_contact_id.map(|id| PrimaryContactView {
            id,
            full_name: row.contact_full_name,
            title: row.contact_title,
            email: row.contact_email,
            email_status: row.contact_email_status,
        });
        Self {
            lead_id: row.lead_public_id,
            name: row.name,
            address: row.address,
            city: row.city,
            state: row.state,
            zip: row.zip,
            phone: row.phone,
            website: row.website,
            maps_url: row.maps_url,
            contact_form_url: row.contact_form_url,
            source_geo_label: row.source_geo_label,
            primary_contact,
            signals: signals.into_iter().map(SignalView::from).collect(),
            attributed_at: row.attributed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLogView {
    pub id: i64,
    pub event: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<RunLogRow> for RunLogView {
    fn from(row: RunLogRow) -> Self {
        Self {
            id: row.id,
            event: row.event,
            payload: row.payload,
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Validates `plan` and stores it as a new `queued` job.
///
/// # Errors
///
/// - [`PipelineError::Validation`] if the plan cannot drive a job.
/// - [`PipelineError::Db`] if the insert fails.
pub async fn create_job(pool: &PgPool, plan: JobPlan) -> Result<JobView, PipelineError> {
    let plan = plan.validated()?;
    let segment_count = build_geo_segments(&plan).len();
    let plan_json = serde_json::to_value(&plan)
        .map_err(|e| PipelineError::Validation(format!("plan is not serializable: {e}")))?;

    let target_firm_count = i32::try_from(plan.target_firm_count)
        .map_err(|_| PipelineError::Validation("target_firm_count is too large".to_string()))?;
    let max_searches = i32::try_from(plan.max_searches)
        .map_err(|_| PipelineError::Validation("max_searches is too large".to_string()))?;

    let row = leadpipe_db::create_job(
        pool,
        &NewJob {
            plan: &plan_json,
            target_firm_count,
            max_searches,
            allow_reinclude: plan.toggles.allow_reinclude,
        },
    )
    .await?;

    leadpipe_db::append_run_log(
        pool,
        row.id,
        "job_created",
        &json!({
            "business_type": plan.business_type,
            "keywords": plan.keywords.len(),
            "segments": segment_count,
            "target_firm_count": target_firm_count,
        }),
    )
    .await?;

    tracing::info!(job = %row.public_id, segments = segment_count, "job created");
    Ok(JobView::from(&row))
}

/// Cancels a job. Canceling a job that already finished changes nothing and
/// returns its current state.
///
/// # Errors
///
/// - [`PipelineError::NotFound`] for an unknown job.
/// - [`PipelineError::Db`] on storage failure.
pub async fn cancel_job(pool: &PgPool, job_id: Uuid) -> Result<JobView, PipelineError> {
    let job = load_job(pool, job_id).await?;
    let Some(canceled) = leadpipe_db::cancel_job(pool, job.id).await? else {
        tracing::info!(job = %job_id, status = %job.status, "cancel ignored; job already finished");
        return Ok(JobView::from(&job));
    };

    leadpipe_db::append_run_log(
        pool,
        job.id,
        "job_canceled",
        &json!({
            "previous_status": job.status,
            "progress_count": job.progress_count,
        }),
    )
    .await?;

    tracing::info!(job = %job_id, "job canceled");
    Ok(JobView::from(&canceled))
}

/// # Errors
///
/// Returns [`PipelineError::NotFound`] for an unknown job.
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<JobView, PipelineError> {
    Ok(JobView::from(&load_job(pool, job_id).await?))
}

/// Most recent jobs first.
///
/// # Errors
///
/// Returns [`PipelineError::Db`] if the query fails.
pub async fn list_jobs(pool: &PgPool, limit: i64) -> Result<Vec<JobView>, PipelineError> {
    let rows = leadpipe_db::list_jobs(pool, limit.clamp(1, MAX_LIST_LIMIT)).await?;
    Ok(rows.iter().map(JobView::from).collect())
}

/// A page of a job's leads with their primary contact and signals.
///
/// # Errors
///
/// - [`PipelineError::NotFound`] for an unknown job.
/// - [`PipelineError::Db`] if a query fails.
pub async fn list_results(
    pool: &PgPool,
    job_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<ResultView>, PipelineError> {
    let job = load_job(pool, job_id).await?;
    let rows =
        leadpipe_db::list_job_results(pool, job.id, limit.clamp(1, MAX_LIST_LIMIT), offset.max(0))
            .await?;

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        let signals = leadpipe_db::list_lead_signals(pool, row.lead_id, None).await?;
        results.push(ResultView::new(row, signals));
    }
    Ok(results)
}

/// A job's run log, oldest first, optionally filtered by event.
///
/// # Errors
///
/// - [`PipelineError::NotFound`] for an unknown job.
/// - [`PipelineError::Db`] if the query fails.
pub async fn list_run_log(
    pool: &PgPool,
    job_id: Uuid,
    event: Option<&str>,
    limit: i64,
) -> Result<Vec<RunLogView>, PipelineError> {
    let job = load_job(pool, job_id).await?;
    let rows =
        leadpipe_db::list_run_logs(pool, job.id, event, limit.clamp(1, MAX_LIST_LIMIT)).await?;
    Ok(rows.into_iter().map(RunLogView::from).collect())
}
