use super::*;
use crate::stages::{drive, BatchReport};
use leadpipe_pipeline::{DoneReason, PipelineError};
use rust_decimal::Decimal;

const JOB: &str = "0b6f2a4e-5c8d-4f1a-9e3b-2d7c6a1f0e99";

fn job_id() -> Uuid {
    Uuid::parse_str(JOB).expect("uuid")
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["leadpipe-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["leadpipe-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["leadpipe-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_job_create_with_plan_path() {
    let cli = Cli::try_parse_from(["leadpipe-cli", "job", "create", "--plan", "plans/durham.yaml"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Job {
            command: JobCommands::Create { ref plan }
        }) if plan.to_str() == Some("plans/durham.yaml")
    ));
}

#[test]
fn job_logs_defaults_limit_and_takes_event_filter() {
    let cli = Cli::try_parse_from(["leadpipe-cli", "job", "logs", JOB, "--event", "collect_batch"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Job {
            command: JobCommands::Logs {
                event: Some(ref e),
                limit: 50,
                ..
            }
        }) if e == "collect_batch"
    ));
}

#[test]
fn job_show_rejects_non_uuid() {
    assert!(Cli::try_parse_from(["leadpipe-cli", "job", "show", "job-7"]).is_err());
}

#[test]
fn parses_template_save() {
    let cli = Cli::try_parse_from([
        "leadpipe-cli",
        "template",
        "save",
        "--name",
        "Durham sweep",
        "--plan",
        "plans/durham.yaml",
    ])
    .expect("expected valid cli args");

    let Some(Commands::Template {
        command:
            TemplateCommands::Save {
                name,
                description,
                plan,
            },
    }) = cli.command
    else {
        panic!("expected template save");
    };
    assert_eq!(name, "Durham sweep");
    assert!(description.is_none());
    assert_eq!(plan.to_str(), Some("plans/durham.yaml"));

    assert!(Cli::try_parse_from(["leadpipe-cli", "template", "save", "--name", "x"]).is_err());
}

#[test]
fn template_list_defaults_and_launch_takes_uuid() {
    let cli = Cli::try_parse_from(["leadpipe-cli", "template", "list"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Template {
            command: TemplateCommands::List { limit: 200 }
        })
    ));

    let cli = Cli::try_parse_from(["leadpipe-cli", "template", "launch", JOB])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Template {
            command: TemplateCommands::Launch { template_id }
        }) if template_id == job_id()
    ));
    assert!(Cli::try_parse_from(["leadpipe-cli", "template", "launch", "durham"]).is_err());
}

#[test]
fn zips_takes_a_state() {
    let cli =
        Cli::try_parse_from(["leadpipe-cli", "zips", "nc"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Zips { ref state }) if state == "nc"
    ));
    assert!(Cli::try_parse_from(["leadpipe-cli", "zips"]).is_err());
}

#[test]
fn collect_runs_one_batch_by_default() {
    let cli = Cli::try_parse_from(["leadpipe-cli", "collect", JOB]).expect("expected valid cli args");

    let Some(Commands::Collect { job_id: id, drive }) = cli.command else {
        panic!("expected collect command");
    };
    assert_eq!(id, job_id());
    assert!(!drive.until_done);
    assert_eq!(drive.max_batches, 100);
}

#[test]
fn verify_requires_a_spend_cap() {
    assert!(Cli::try_parse_from(["leadpipe-cli", "verify", JOB]).is_err());
}

#[test]
fn verify_builds_stage_params_from_flags() {
    let other = "7d1e3c5a-0f2b-4a6c-8e9d-1b2c3d4e5f60";
    let cli = Cli::try_parse_from([
        "leadpipe-cli",
        "verify",
        JOB,
        "--spend-cap",
        "12.50",
        "--batch-size",
        "10",
        "--scope-job-id",
        other,
        "--generate-candidates",
        "--until-done",
    ])
    .expect("expected valid cli args");

    let Some(Commands::Verify {
        stage,
        keep_unverified,
        generate_candidates,
        drive,
        ..
    }) = cli.command
    else {
        panic!("expected verify command");
    };
    assert!(!keep_unverified);
    assert!(generate_candidates);
    assert!(drive.until_done);

    let params = stage.to_params();
    assert_eq!(params.spend_cap, Some(Decimal::new(1250, 2)));
    assert_eq!(params.batch_size, Some(10));
    assert_eq!(params.scope_job_ids, vec![Uuid::parse_str(other).expect("uuid")]);
    assert!(params.selected_lead_ids.is_none());
}

#[test]
fn enrich_parses_mode() {
    let cli = Cli::try_parse_from([
        "leadpipe-cli",
        "enrich",
        JOB,
        "--spend-cap",
        "5",
        "--mode",
        "deep",
        "--leads-per-company",
        "3",
    ])
    .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Enrich {
            mode: EnrichmentMode::Deep,
            leads_per_company: Some(3),
            ..
        })
    ));
}

#[test]
fn estimate_accepts_dashed_stage_names() {
    let cli = Cli::try_parse_from(["leadpipe-cli", "estimate", JOB, "ads-scan"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Estimate {
            stage: Stage::AdsScan,
            ..
        })
    ));

    assert!(Cli::try_parse_from(["leadpipe-cli", "estimate", JOB, "outreach"]).is_err());
}

#[derive(serde::Serialize)]
struct FakeOutcome {
    done: bool,
    reason: Option<DoneReason>,
}

impl BatchReport for FakeOutcome {
    fn is_done(&self) -> bool {
        self.done
    }

    fn reason(&self) -> Option<DoneReason> {
        self.reason
    }
}

fn drive_args(until_done: bool, max_batches: u32) -> stages::DriveArgs {
    stages::DriveArgs {
        until_done,
        max_batches,
    }
}

#[tokio::test]
async fn drive_stops_when_stage_reports_done() {
    let mut calls = 0;
    let batches = drive(&drive_args(true, 10), || {
        calls += 1;
        let done = calls == 3;
        async move {
            Ok::<_, PipelineError>(FakeOutcome {
                done,
                reason: done.then_some(DoneReason::NoPendingWork),
            })
        }
    })
    .await
    .expect("drive");

    assert_eq!(batches, 3);
    assert_eq!(calls, 3);
}

#[tokio::test]
async fn drive_without_until_done_runs_once() {
    let mut calls = 0;
    let batches = drive(&drive_args(false, 10), || {
        calls += 1;
        async {
            Ok::<_, PipelineError>(FakeOutcome {
                done: false,
                reason: None,
            })
        }
    })
    .await
    .expect("drive");

    assert_eq!((batches, calls), (1, 1));
}

#[tokio::test]
async fn drive_stops_on_busy_and_caps_batches() {
    let batches = drive(&drive_args(true, 10), || async {
        Ok::<_, PipelineError>(FakeOutcome {
            done: false,
            reason: Some(DoneReason::Busy),
        })
    })
    .await
    .expect("drive");
    assert_eq!(batches, 1);

    let batches = drive(&drive_args(true, 4), || async {
        Ok::<_, PipelineError>(FakeOutcome {
            done: false,
            reason: None,
        })
    })
    .await
    .expect("drive");
    assert_eq!(batches, 4);
}

#[tokio::test]
async fn drive_propagates_batch_errors() {
    let result = drive(&drive_args(true, 10), || async {
        Err::<FakeOutcome, _>(PipelineError::Config("places key missing".to_string()))
    })
    .await;

    let err = result.expect_err("error");
    assert!(err.to_string().contains("places key missing"));
}
