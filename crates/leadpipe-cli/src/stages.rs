//! Stage commands. Each runs one batch, or keeps running batches with
//! `--until-done`, printing every outcome as it arrives.

use std::future::Future;

use clap::Args;
use leadpipe_pipeline::{
    AdsScanOutcome, AdsScanParams, CollectOutcome, DoneReason, EnrichOutcome, EnrichParams,
    PipelineContext, PipelineError, StageParams, VerifyOutcome, VerifyParams,
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::print_json;

#[derive(Debug, Clone, Args)]
pub struct DriveArgs {
    /// Keep running batches until the stage reports done
    #[arg(long)]
    pub until_done: bool,
    /// Upper bound on batches for `--until-done`
    #[arg(long, default_value_t = 100)]
    pub max_batches: u32,
}

/// Flags shared by the spend-capped stages.
#[derive(Debug, Clone, Args)]
pub struct StageArgs {
    /// Total USD this stage may spend on the job
    #[arg(long)]
    pub spend_cap: Decimal,
    #[arg(long)]
    pub batch_size: Option<u32>,
    /// Include results of another job; repeatable
    #[arg(long = "scope-job-id")]
    pub scope_job_ids: Vec<Uuid>,
    /// Restrict to these leads; repeatable
    #[arg(long = "lead-id")]
    pub lead_ids: Vec<Uuid>,
}

impl StageArgs {
    pub(crate) fn to_params(&self) -> StageParams {
        StageParams {
            scope_job_ids: self.scope_job_ids.clone(),
            selected_lead_ids: (!self.lead_ids.is_empty()).then(|| self.lead_ids.clone()),
            batch_size: self.batch_size,
            spend_cap: Some(self.spend_cap),
        }
    }
}

/// What the drive loop needs from a batch outcome.
pub(crate) trait BatchReport: Serialize {
    fn is_done(&self) -> bool;
    fn reason(&self) -> Option<DoneReason>;
}

macro_rules! batch_report {
    ($($outcome:ty),+) => {
        $(impl BatchReport for $outcome {
            fn is_done(&self) -> bool {
                self.done
            }

            fn reason(&self) -> Option<DoneReason> {
                self.reason
            }
        })+
    };
}

batch_report!(CollectOutcome, VerifyOutcome, EnrichOutcome, AdsScanOutcome);

/// Runs `run_batch` once, or until done when `--until-done` is set.
///
/// Returns the number of batches run.
pub(crate) async fn drive<T, F, Fut>(args: &DriveArgs, mut run_batch: F) -> anyhow::Result<u32>
where
    T: BatchReport,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let max_batches = if args.until_done {
        args.max_batches.max(1)
    } else {
        1
    };

    for batch in 1..=max_batches {
        let outcome = run_batch().await?;
        print_json(&outcome)?;

        if outcome.is_done() {
            return Ok(batch);
        }
        if outcome.reason() == Some(DoneReason::Busy) {
            tracing::warn!("another batch holds the lock for this job and stage; stopping");
            return Ok(batch);
        }
    }

    if args.until_done {
        tracing::warn!(max_batches, "stage not done after max batches");
    }
    Ok(max_batches)
}

pub(crate) async fn collect(
    ctx: &PipelineContext,
    job_id: Uuid,
    args: &DriveArgs,
) -> anyhow::Result<()> {
    let batches = drive(args, move || leadpipe_pipeline::run_collect_batch(ctx, job_id)).await?;
    tracing::info!(job = %job_id, batches, "collect finished");
    Ok(())
}

pub(crate) async fn verify(
    ctx: &PipelineContext,
    job_id: Uuid,
    params: &VerifyParams,
    args: &DriveArgs,
) -> anyhow::Result<()> {
    let batches = drive(args, move || {
        leadpipe_pipeline::run_verification_batch(ctx, job_id, params)
    })
    .await?;
    tracing::info!(job = %job_id, batches, "verify finished");
    Ok(())
}

pub(crate) async fn enrich(
    ctx: &PipelineContext,
    job_id: Uuid,
    params: &EnrichParams,
    args: &DriveArgs,
) -> anyhow::Result<()> {
    let batches = drive(args, move || {
        leadpipe_pipeline::run_enrichment_batch(ctx, job_id, params)
    })
    .await?;
    tracing::info!(job = %job_id, batches, "enrich finished");
    Ok(())
}

pub(crate) async fn ads_scan(
    ctx: &PipelineContext,
    job_id: Uuid,
    params: &AdsScanParams,
    args: &DriveArgs,
) -> anyhow::Result<()> {
    let batches = drive(args, move || {
        leadpipe_pipeline::run_ads_scan_batch(ctx, job_id, params)
    })
    .await?;
    tracing::info!(job = %job_id, batches, "ads scan finished");
    Ok(())
}
