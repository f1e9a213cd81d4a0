//! `template` sub-commands.

use std::path::PathBuf;

use clap::Subcommand;
use leadpipe_pipeline::PipelineContext;
use uuid::Uuid;

use crate::print_json;

#[derive(Debug, Subcommand)]
pub enum TemplateCommands {
    /// Save a YAML or JSON plan file as a named template
    Save {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        plan: PathBuf,
    },
    /// List active templates, newest first
    List {
        #[arg(long, default_value_t = 200)]
        limit: i64,
    },
    /// Create a job from a saved template
    Launch { template_id: Uuid },
}

pub(crate) async fn run(ctx: &PipelineContext, command: TemplateCommands) -> anyhow::Result<()> {
    match command {
        TemplateCommands::Save {
            name,
            description,
            plan,
        } => {
            let plan = leadpipe_core::read_plan_file(&plan)?;
            let template =
                leadpipe_pipeline::save_template(ctx, &name, description.as_deref(), plan).await?;
            print_json(&template)
        }
        TemplateCommands::List { limit } => {
            print_json(&leadpipe_pipeline::list_templates(ctx, limit).await?)
        }
        TemplateCommands::Launch { template_id } => {
            let job = leadpipe_pipeline::create_job_from_template(ctx, template_id).await?;
            tracing::info!(job = %job.id, template = %template_id, "job created");
            print_json(&job)
        }
    }
}
