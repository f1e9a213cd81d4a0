//! Saved plan templates and the state ZIP lookup.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use leadpipe_core::JobPlan;
use leadpipe_pipeline::{JobView, StateZipsView, TemplateView};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_pipeline_error, parse_uuid, ApiError, ApiResponse, AppState};

const DEFAULT_TEMPLATE_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub(super) struct SaveTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub plan: JobPlan,
}

#[derive(Debug, Deserialize)]
pub(super) struct TemplateListQuery {
    pub limit: Option<i64>,
}

/// POST /api/v1/templates
pub(super) async fn save_template(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<SaveTemplateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<TemplateView>>), ApiError> {
    let rid = &req_id.0;
    let Json(request) =
        body.map_err(|e| ApiError::new(rid, "validation_error", e.body_text()))?;

    let template = leadpipe_pipeline::save_template(
        &state.pipeline,
        &request.name,
        request.description.as_deref(),
        request.plan,
    )
    .await
    .map_err(|e| map_pipeline_error(rid, &e))?;

    Ok((StatusCode::CREATED, ApiResponse::new(template, req_id.0)))
}

/// GET /api/v1/templates
pub(super) async fn list_templates(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TemplateListQuery>,
) -> Result<Json<ApiResponse<Vec<TemplateView>>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_TEMPLATE_LIMIT);
    let templates = leadpipe_pipeline::list_templates(&state.pipeline, limit)
        .await
        .map_err(|e| map_pipeline_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(templates, req_id.0))
}

/// POST /api/v1/templates/{template_id}/jobs
pub(super) async fn launch_template(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(template_id): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<JobView>>), ApiError> {
    let template_id = parse_uuid(&req_id.0, "template", &template_id)?;
    let job = leadpipe_pipeline::create_job_from_template(&state.pipeline, template_id)
        .await
        .map_err(|e| map_pipeline_error(&req_id.0, &e))?;
    Ok((StatusCode::CREATED, ApiResponse::new(job, req_id.0)))
}

/// GET /api/v1/states/{state}/zips
pub(super) async fn state_zips(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<StateZipsView>>, ApiError> {
    let zips = leadpipe_pipeline::list_state_zips(&state.pipeline, &code)
        .await
        .map_err(|e| map_pipeline_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(zips, req_id.0))
}
