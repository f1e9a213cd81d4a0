//! Batch orchestration for lead collection and the spend-capped follow-up
//! stages.
//!
//! Every entry point runs exactly one bounded batch and reports whether the
//! stage is done; callers (the HTTP API, the CLI, the cron autodrive) loop
//! until it is.

pub mod ads_scan;
pub mod collect;
pub mod context;
pub mod enrich;
pub mod error;
pub mod estimates;
pub mod jobs;
pub mod outcome;
mod spend;
pub mod templates;
#[cfg(test)]
mod test_support;
pub mod verify;
pub mod zips;

pub use ads_scan::{run_ads_scan_batch, AdsScanOutcome, AdsScanParams};
pub use collect::{run_collect_batch, CollectOutcome, SearchSummary};
pub use context::PipelineContext;
pub use enrich::{run_enrichment_batch, EnrichOutcome, EnrichParams};
pub use error::PipelineError;
pub use estimates::{estimate_stage, CollectEstimate, EstimateParams, StageEstimate};
pub use jobs::{
    cancel_job, create_job, get_job, list_jobs, list_results, list_run_log, JobView, ResultView,
    RunLogView,
};
pub use outcome::DoneReason;
pub use spend::StageParams;
pub use templates::{
    create_job_from_template, list_templates, save_template, TemplateView,
};
pub use verify::{run_verification_batch, VerifyOutcome, VerifyParams};
pub use zips::{fill_plan_zips, list_state_zips, StateZipsView};
