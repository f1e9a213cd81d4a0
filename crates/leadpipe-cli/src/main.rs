mod jobs;
mod stages;
mod templates;

use clap::{Parser, Subcommand};
use leadpipe_core::{EnrichmentMode, Stage};
use leadpipe_pipeline::PipelineContext;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::jobs::JobCommands;
use crate::stages::{DriveArgs, StageArgs};
use crate::templates::TemplateCommands;

#[derive(Debug, Parser)]
#[command(name = "leadpipe-cli")]
#[command(about = "Lead collection pipeline command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Create, inspect, and cancel jobs
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Save, list, and launch plan templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// List every ZIP code in a US state
    Zips {
        /// Two-letter state code, e.g. NC
        state: String,
    },
    /// Run collection batches for a job
    Collect {
        job_id: Uuid,
        #[command(flatten)]
        drive: DriveArgs,
    },
    /// Run email verification batches under a spend cap
    Verify {
        job_id: Uuid,
        #[command(flatten)]
        stage: StageArgs,
        /// Keep addresses that verified `risky` or `unknown` too
        #[arg(long)]
        keep_unverified: bool,
        /// Also try common name patterns at the firm's domain
        #[arg(long)]
        generate_candidates: bool,
        #[arg(long)]
        max_attempts_per_firm: Option<u32>,
        #[command(flatten)]
        drive: DriveArgs,
    },
    /// Run contact enrichment batches under a spend cap
    Enrich {
        job_id: Uuid,
        #[command(flatten)]
        stage: StageArgs,
        /// `budget` or `deep`
        #[arg(long, default_value = "budget")]
        mode: EnrichmentMode,
        #[arg(long)]
        leads_per_company: Option<u32>,
        #[command(flatten)]
        drive: DriveArgs,
    },
    /// Run ads-library scan batches under a spend cap
    AdsScan {
        job_id: Uuid,
        #[command(flatten)]
        stage: StageArgs,
        /// Lookback window in days
        #[arg(long)]
        period_days: Option<u32>,
        /// Ad count at or above which a lead is flagged
        #[arg(long)]
        min_ads: Option<i32>,
        #[command(flatten)]
        drive: DriveArgs,
    },
    /// Estimate the cost of a stage and record it on the job
    Estimate {
        job_id: Uuid,
        /// collect, verification, enrichment, or ads-scan
        #[arg(value_parser = parse_stage)]
        stage: Stage,
        #[arg(long = "scope-job-id")]
        scope_job_ids: Vec<Uuid>,
        #[arg(long = "lead-id")]
        lead_ids: Vec<Uuid>,
        #[arg(long, default_value = "budget")]
        mode: EnrichmentMode,
        #[arg(long)]
        leads_per_company: Option<u32>,
        #[arg(long)]
        period_days: Option<u32>,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check database connectivity
    Ping,
}

fn parse_stage(raw: &str) -> Result<Stage, String> {
    raw.replace('-', "_").parse().map_err(|e| format!("{e}"))
}

/// Writes a value to stdout as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("leadpipe-cli: no command given; run with --help for usage");
        return Ok(());
    };

    let config = leadpipe_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let pool_config = leadpipe_db::PoolConfig::from_app_config(&config);
    let pool = leadpipe_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Migrate => {
                let applied = leadpipe_db::run_migrations(&pool).await?;
                println!("applied {applied} migrations");
            }
            DbCommands::Ping => {
                leadpipe_db::ping(&pool).await?;
                println!("database ok");
            }
        },
        command => {
            let ctx = PipelineContext::from_config(pool, config)?;
            match command {
                Commands::Job { command } => jobs::run(&ctx, command).await?,
                Commands::Template { command } => templates::run(&ctx, command).await?,
                Commands::Zips { state } => {
                    print_json(&leadpipe_pipeline::list_state_zips(&ctx, &state).await?)?;
                }
                command => run_stage_command(&ctx, command).await?,
            }
        }
    }

    Ok(())
}

async fn run_stage_command(ctx: &PipelineContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Collect { job_id, drive } => stages::collect(ctx, job_id, &drive).await,
        Commands::Verify {
            job_id,
            stage,
            keep_unverified,
            generate_candidates,
            max_attempts_per_firm,
            drive,
        } => {
            let params = leadpipe_pipeline::VerifyParams {
                stage: stage.to_params(),
                valid_only: !keep_unverified,
                generate_candidates,
                max_attempts_per_firm,
            };
            stages::verify(ctx, job_id, &params, &drive).await
        }
        Commands::Enrich {
            job_id,
            stage,
            mode,
            leads_per_company,
            drive,
        } => {
            let params = leadpipe_pipeline::EnrichParams {
                stage: stage.to_params(),
                mode,
                leads_per_company,
            };
            stages::enrich(ctx, job_id, &params, &drive).await
        }
        Commands::AdsScan {
            job_id,
            stage,
            period_days,
            min_ads,
            drive,
        } => {
            let params = leadpipe_pipeline::AdsScanParams {
                stage: stage.to_params(),
                period_days,
                min_ads,
            };
            stages::ads_scan(ctx, job_id, &params, &drive).await
        }
        Commands::Estimate {
            job_id,
            stage,
            scope_job_ids,
            lead_ids,
            mode,
            leads_per_company,
            period_days,
        } => {
            let params = leadpipe_pipeline::EstimateParams {
                scope_job_ids,
                selected_lead_ids: (!lead_ids.is_empty()).then_some(lead_ids),
                mode,
                leads_per_company,
                period_days,
            };
            let estimate = leadpipe_pipeline::estimate_stage(ctx, job_id, stage, &params).await?;
            print_json(&estimate)
        }
        Commands::Db { .. }
        | Commands::Job { .. }
        | Commands::Template { .. }
        | Commands::Zips { .. } => {
            anyhow::bail!("not a stage command")
        }
    }
}

#[cfg(test)]
mod tests;
