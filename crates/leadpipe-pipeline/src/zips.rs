//! State → ZIP lookups for zip-sweep plans that name only a state.

use leadpipe_core::JobPlan;
use serde::Serialize;

use crate::context::PipelineContext;
use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateZipsView {
    pub state: String,
    pub zips: Vec<String>,
}

fn state_code(raw: &str) -> Result<&'static str, PipelineError> {
    leadpipe_core::parse_state_code(raw).map_err(|e| PipelineError::Validation(e.to_string()))
}

/// Every five-digit ZIP in a state, sorted.
///
/// # Errors
///
/// - [`PipelineError::Validation`] unless `state` is one of the 50 state codes.
/// - [`PipelineError::Upstream`] if the ZIP dataset cannot be fetched.
pub async fn list_state_zips(
    ctx: &PipelineContext,
    state: &str,
) -> Result<StateZipsView, PipelineError> {
    let state = state_code(state)?;
    let zips = ctx.zips().zips_for_state(state).await?;
    Ok(StateZipsView {
        state: state.to_string(),
        zips,
    })
}

/// Fills the ZIP list of a zip sweep that names only a state. Any other plan
/// comes back unchanged.
///
/// # Errors
///
/// - [`PipelineError::Validation`] for an unknown state or one with no ZIPs.
/// - [`PipelineError::Upstream`] if the ZIP dataset cannot be fetched.
pub async fn fill_plan_zips(
    ctx: &PipelineContext,
    plan: JobPlan,
) -> Result<JobPlan, PipelineError> {
    let Some(raw) = plan.state_needing_zips() else {
        return Ok(plan);
    };
    let state = state_code(raw)?;

    let zips = ctx.zips().zips_for_state(state).await?;
    if zips.is_empty() {
        return Err(PipelineError::Validation(format!(
            "no ZIP codes found for state {state}"
        )));
    }
    tracing::info!(state, zips = zips.len(), "zip sweep filled from state");
    Ok(plan.with_zips(zips))
}
