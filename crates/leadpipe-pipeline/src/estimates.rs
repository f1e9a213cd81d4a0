//! Cost estimates for a job's pending work.
//!
//! Spend-capped stage estimates are stored on the job and move an idle
//! stage to `estimated`. The collection estimate is informational only.

use chrono::Utc;
use leadpipe_core::{
    estimate_ads_scan_cost, estimate_collect_api_cost, estimate_enrichment_cost,
    estimate_verification_cost, AdsScanEstimate, CollectApiCost, EnrichmentEstimate,
    EnrichmentMode, Stage, VerificationEstimate, SIGNAL_IN_BUSINESS_20_PLUS,
};
use leadpipe_db::{JobRow, WorkScope};
use leadpipe_providers::BATCH_PLACE_LIMIT;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ads_scan::{clamp_period_days, scan_period};
use crate::collect::job_segments;
use crate::context::PipelineContext;
use crate::enrich::clamp_leads_per_company;
use crate::error::PipelineError;
use crate::spend::{load_job, resolve_scope};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateParams {
    #[serde(default)]
    pub scope_job_ids: Vec<Uuid>,
    #[serde(default)]
    pub selected_lead_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub mode: EnrichmentMode,
    #[serde(default)]
    pub leads_per_company: Option<u32>,
    #[serde(default)]
    pub period_days: Option<u32>,
}

/// Upper bound on the directory calls left for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectEstimate {
    pub remaining_searches: u32,
    pub api: CollectApiCost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "estimate", rename_all = "snake_case")]
pub enum StageEstimate {
    Collect(CollectEstimate),
    Verification(VerificationEstimate),
    Enrichment(EnrichmentEstimate),
    AdsScan(AdsScanEstimate),
}

/// Searches left before the cursor or the search budget runs out.
#[must_use]
pub fn remaining_searches(job: &JobRow, segment_count: usize, keyword_count: usize) -> u32 {
    let keyword_count = keyword_count.max(1);
    let total_cells = segment_count.saturating_mul(keyword_count);
    let done_cells = usize::try_from(job.segment_offset)
        .unwrap_or(0)
        .saturating_mul(keyword_count)
        .saturating_add(usize::try_from(job.keyword_offset).unwrap_or(0));
    let by_cursor = total_cells.saturating_sub(done_cells);
    let by_budget = usize::try_from(job.max_searches.saturating_sub(job.searches_executed))
        .unwrap_or(0);
    u32::try_from(by_cursor.min(by_budget)).unwrap_or(u32::MAX)
}

fn collect_estimate(
    ctx: &PipelineContext,
    job: &JobRow,
) -> Result<CollectEstimate, PipelineError> {
    let config = ctx.config();
    let segments = job_segments(job)?;
    let keyword_count = job
        .plan
        .get("keywords")
        .and_then(serde_json::Value::as_array)
        .map_or(0, Vec::len);
    let remaining = remaining_searches(job, segments.len(), keyword_count);
    let per_search = u32::try_from(BATCH_PLACE_LIMIT).unwrap_or(u32::MAX);
    let api = estimate_collect_api_cost(
        remaining,
        remaining.saturating_mul(per_search),
        config.places_text_search_unit_cost_usd,
        config.places_details_unit_cost_usd,
    );
    Ok(CollectEstimate {
        remaining_searches: remaining,
        api,
    })
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Estimates `stage` over the job's pending work and records the result.
///
/// # Errors
///
/// - [`PipelineError::NotFound`] for an unknown job or scope.
/// - [`PipelineError::Config`] for an ads-scan estimate without a provider.
/// - [`PipelineError::Db`] on storage failure.
pub async fn estimate_stage(
    ctx: &PipelineContext,
    job_id: Uuid,
    stage: Stage,
    params: &EstimateParams,
) -> Result<StageEstimate, PipelineError> {
    let pool = ctx.pool();
    let config = ctx.config();
    let job = load_job(pool, job_id).await?;

    let (job_ids, lead_ids) = resolve_scope(
        ctx,
        &job,
        &params.scope_job_ids,
        params.selected_lead_ids.as_deref(),
    )
    .await?;
    let scope = WorkScope {
        job_ids: &job_ids,
        lead_ids: lead_ids.as_deref(),
    };

    let estimate = match stage {
        Stage::Collect => return collect_estimate(ctx, &job).map(StageEstimate::Collect),
        Stage::Verification => {
            let count = leadpipe_db::count_pending_verification(pool, scope).await?;
            StageEstimate::Verification(estimate_verification_cost(
                to_count(count),
                config.verification_unit_cost_usd,
                config.verification_buffer_multiplier,
            ))
        }
        Stage::Enrichment => {
            let count =
                leadpipe_db::count_pending_enrichment(pool, scope, SIGNAL_IN_BUSINESS_20_PLUS)
                    .await?;
            StageEstimate::Enrichment(estimate_enrichment_cost(
                ctx.enrichment_pricing(),
                to_count(count),
                clamp_leads_per_company(params.leads_per_company),
                params.mode,
            ))
        }
        Stage::AdsScan => {
            let provider = ctx.ads()?.provider_name();
            let period = scan_period(
                Utc::now().date_naive(),
                clamp_period_days(params.period_days),
            );
            let count = leadpipe_db::count_pending_ads_scan(pool, scope, provider, period).await?;
            StageEstimate::AdsScan(estimate_ads_scan_cost(
                to_count(count),
                config.ads_unit_cost_usd,
                config.ads_buffer_multiplier,
            ))
        }
    };

    let stored = match &estimate {
        StageEstimate::Verification(e) => serde_json::to_value(e),
        StageEstimate::Enrichment(e) => serde_json::to_value(e),
        StageEstimate::AdsScan(e) => serde_json::to_value(e),
        StageEstimate::Collect(e) => serde_json::to_value(e),
    }
    .map_err(|e| PipelineError::Validation(format!("estimate is not serializable: {e}")))?;
    leadpipe_db::record_stage_estimate(pool, job.id, stage, &stored).await?;

    tracing::info!(job = %job.public_id, %stage, "stage estimate recorded");
    Ok(estimate)
}
