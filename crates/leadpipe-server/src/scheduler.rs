//! Optional auto-driver for collection.
//!
//! When `LEADPIPE_AUTODRIVE_CRON` is set, each tick runs one collection
//! batch for every queued or running job. The per-job advisory lock keeps a
//! tick from overlapping a batch a client started over HTTP.

use std::sync::Arc;

use leadpipe_pipeline::PipelineContext;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Counters from one auto-drive tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriveSummary {
    pub jobs: usize,
    pub finished: usize,
    pub failed: usize,
}

/// Builds and starts the scheduler, or returns `None` when no cron
/// expression is configured.
///
/// The returned handle must be kept alive; dropping it stops the jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] for an invalid cron expression or if the
/// scheduler fails to start.
pub async fn build_scheduler(
    ctx: Arc<PipelineContext>,
) -> Result<Option<JobScheduler>, JobSchedulerError> {
    let Some(cron) = ctx.config().autodrive_cron.clone() else {
        tracing::info!("LEADPIPE_AUTODRIVE_CRON not set; collection auto-drive disabled");
        return Ok(None);
    };

    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let ctx = Arc::clone(&ctx);

        Box::pin(async move {
            let summary = drive_active_jobs(&ctx).await;
            tracing::info!(
                jobs = summary.jobs,
                finished = summary.finished,
                failed = summary.failed,
                "scheduler: auto-drive tick complete"
            );
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(%cron, "scheduler: collection auto-drive registered");
    Ok(Some(scheduler))
}

/// Runs one collection batch for each active job. Failures are logged and
/// do not stop the tick.
pub async fn drive_active_jobs(ctx: &PipelineContext) -> DriveSummary {
    let job_ids = match leadpipe_db::list_active_job_ids(ctx.pool()).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to load active jobs");
            return DriveSummary::default();
        }
    };

    let mut summary = DriveSummary {
        jobs: job_ids.len(),
        ..DriveSummary::default()
    };

    for job_id in job_ids {
        match leadpipe_pipeline::run_collect_batch(ctx, job_id).await {
            Ok(outcome) if outcome.done => {
                summary.finished += 1;
                tracing::info!(
                    job = %job_id,
                    progress = outcome.progress_count,
                    reason = ?outcome.reason,
                    "scheduler: job collection finished"
                );
            }
            Ok(_) => {}
            Err(e) => {
                summary.failed += 1;
                tracing::error!(job = %job_id, error = %e, "scheduler: collection batch failed");
            }
        }
    }

    summary
}
