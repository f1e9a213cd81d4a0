//! Batch stage handlers. Each call runs at most one batch and reports
//! whether the stage is done; callers loop until `done`.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Extension, Json,
};
use leadpipe_core::Stage;
use leadpipe_pipeline::{
    AdsScanOutcome, AdsScanParams, CollectOutcome, EnrichOutcome, EnrichParams, EstimateParams,
    StageEstimate, VerifyOutcome, VerifyParams,
};

use crate::middleware::RequestId;

use super::{map_pipeline_error, parse_body, parse_job_id, ApiError, ApiResponse, AppState};

/// POST /api/v1/jobs/{job_id}/collect
pub(super) async fn collect(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<CollectOutcome>>, ApiError> {
    let job_id = parse_job_id(&req_id.0, &job_id)?;
    let outcome = leadpipe_pipeline::run_collect_batch(&state.pipeline, job_id)
        .await
        .map_err(|e| map_pipeline_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(outcome, req_id.0))
}

/// POST /api/v1/jobs/{job_id}/verify
pub(super) async fn verify(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<VerifyOutcome>>, ApiError> {
    let job_id = parse_job_id(&req_id.0, &job_id)?;
    let params: VerifyParams = parse_body(&req_id.0, &body)?;
    let outcome = leadpipe_pipeline::run_verification_batch(&state.pipeline, job_id, &params)
        .await
        .map_err(|e| map_pipeline_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(outcome, req_id.0))
}

/// POST /api/v1/jobs/{job_id}/enrich
pub(super) async fn enrich(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<EnrichOutcome>>, ApiError> {
    let job_id = parse_job_id(&req_id.0, &job_id)?;
    let params: EnrichParams = parse_body(&req_id.0, &body)?;
    let outcome = leadpipe_pipeline::run_enrichment_batch(&state.pipeline, job_id, &params)
        .await
        .map_err(|e| map_pipeline_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(outcome, req_id.0))
}

/// POST /api/v1/jobs/{job_id}/ads-scan
pub(super) async fn ads_scan(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<AdsScanOutcome>>, ApiError> {
    let job_id = parse_job_id(&req_id.0, &job_id)?;
    let params: AdsScanParams = parse_body(&req_id.0, &body)?;
    let outcome = leadpipe_pipeline::run_ads_scan_batch(&state.pipeline, job_id, &params)
        .await
        .map_err(|e| map_pipeline_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(outcome, req_id.0))
}

/// POST /api/v1/jobs/{job_id}/estimates/{stage}
pub(super) async fn estimate(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((job_id, stage)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<ApiResponse<StageEstimate>>, ApiError> {
    let rid = &req_id.0;
    let job_id = parse_job_id(rid, &job_id)?;
    let stage: Stage = stage.replace('-', "_").parse().map_err(|_| {
        ApiError::new(
            rid,
            "validation_error",
            format!("stage must be collect, verification, enrichment, or ads_scan; got '{stage}'"),
        )
    })?;
    let params: EstimateParams = parse_body(rid, &body)?;

    let estimate = leadpipe_pipeline::estimate_stage(&state.pipeline, job_id, stage, &params)
        .await
        .map_err(|e| map_pipeline_error(rid, &e))?;
    Ok(ApiResponse::new(estimate, req_id.0))
}
