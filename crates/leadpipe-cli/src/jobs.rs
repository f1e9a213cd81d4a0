//! `job` sub-commands. Everything here prints JSON to stdout.

use std::path::PathBuf;

use clap::Subcommand;
use leadpipe_pipeline::PipelineContext;
use uuid::Uuid;

use crate::print_json;

#[derive(Debug, Subcommand)]
pub enum JobCommands {
    /// Create a job from a YAML or JSON plan file. A zip sweep that names
    /// only `state_code` gets every ZIP in that state.
    Create {
        #[arg(long)]
        plan: PathBuf,
    },
    /// List recent jobs, newest first
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show one job with its stage state
    Show { job_id: Uuid },
    /// Cancel a queued or running job
    Cancel { job_id: Uuid },
    /// Page through a job's leads
    Results {
        job_id: Uuid,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Show a job's run log, newest first
    Logs {
        job_id: Uuid,
        /// Only entries with this event name
        #[arg(long)]
        event: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

pub(crate) async fn run(ctx: &PipelineContext, command: JobCommands) -> anyhow::Result<()> {
    let pool = ctx.pool();
    match command {
        JobCommands::Create { plan } => {
            let plan = leadpipe_core::read_plan_file(&plan)?;
            let plan = leadpipe_pipeline::fill_plan_zips(ctx, plan).await?;
            let job = leadpipe_pipeline::create_job(pool, plan).await?;
            tracing::info!(job = %job.id, "job created");
            print_json(&job)
        }
        JobCommands::List { limit } => print_json(&leadpipe_pipeline::list_jobs(pool, limit).await?),
        JobCommands::Show { job_id } => print_json(&leadpipe_pipeline::get_job(pool, job_id).await?),
        JobCommands::Cancel { job_id } => {
            print_json(&leadpipe_pipeline::cancel_job(pool, job_id).await?)
        }
        JobCommands::Results {
            job_id,
            limit,
            offset,
        } => print_json(&leadpipe_pipeline::list_results(pool, job_id, limit, offset).await?),
        JobCommands::Logs {
            job_id,
            event,
            limit,
        } => print_json(
            &leadpipe_pipeline::list_run_log(pool, job_id, event.as_deref(), limit).await?,
        ),
    }
}
