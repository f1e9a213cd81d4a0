//! Job intake, cancel, and read handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use leadpipe_core::JobPlan;
use leadpipe_pipeline::{JobView, ResultView, RunLogView};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_pipeline_error, normalize_limit, parse_job_id, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResultsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LogsQuery {
    pub event: Option<String>,
    pub limit: Option<i64>,
}

/// POST /api/v1/jobs
pub(super) async fn create_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<JobPlan>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<JobView>>), ApiError> {
    let rid = &req_id.0;
    let Json(plan) =
        body.map_err(|e| ApiError::new(rid, "validation_error", e.body_text()))?;

    let plan = leadpipe_pipeline::fill_plan_zips(&state.pipeline, plan)
        .await
        .map_err(|e| map_pipeline_error(rid, &e))?;
    let job = leadpipe_pipeline::create_job(&state.pool, plan)
        .await
        .map_err(|e| map_pipeline_error(rid, &e))?;

    Ok((StatusCode::CREATED, ApiResponse::new(job, req_id.0)))
}

/// GET /api/v1/jobs
pub(super) async fn list_jobs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<JobView>>>, ApiError> {
    let jobs = leadpipe_pipeline::list_jobs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_pipeline_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(jobs, req_id.0))
}

/// GET /api/v1/jobs/{job_id}
pub(super) async fn get_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<JobView>>, ApiError> {
    let job_id = parse_job_id(&req_id.0, &job_id)?;
    let job = leadpipe_pipeline::get_job(&state.pool, job_id)
        .await
        .map_err(|e| map_pipeline_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(job, req_id.0))
}

/// GET /api/v1/jobs/{job_id}/results
pub(super) async fn list_results(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<ApiResponse<Vec<ResultView>>>, ApiError> {
    let job_id = parse_job_id(&req_id.0, &job_id)?;
    let results = leadpipe_pipeline::list_results(
        &state.pool,
        job_id,
        normalize_limit(query.limit),
        query.offset.unwrap_or(0),
    )
    .await
    .map_err(|e| map_pipeline_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(results, req_id.0))
}

/// GET /api/v1/jobs/{job_id}/logs
pub(super) async fn list_logs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<ApiResponse<Vec<RunLogView>>>, ApiError> {
    let job_id = parse_job_id(&req_id.0, &job_id)?;
    let logs = leadpipe_pipeline::list_run_log(
        &state.pool,
        job_id,
        query.event.as_deref(),
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_pipeline_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(logs, req_id.0))
}

/// POST /api/v1/jobs/{job_id}/cancel
pub(super) async fn cancel_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<JobView>>, ApiError> {
    let job_id = parse_job_id(&req_id.0, &job_id)?;
    let job = leadpipe_pipeline::cancel_job(&state.pool, job_id)
        .await
        .map_err(|e| map_pipeline_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(job, req_id.0))
}
