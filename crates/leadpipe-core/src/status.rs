//! String-backed status enums shared by the store, the pipeline, and the API.
//!
//! Each enum round-trips through the `TEXT` column values used in the
//! database via [`as_str`](JobStatus::as_str) and [`FromStr`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown {kind} value: '{value}'")]
pub struct StatusParseError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = StatusParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(StatusParseError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Lifecycle of a collection job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

string_enum!(JobStatus, "job status", {
    Queued => "queued",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

impl JobStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Why a job ended up in `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Canceled,
    Error,
}

string_enum!(FailureReason, "failure reason", {
    Canceled => "canceled",
    Error => "error",
});

/// Per-stage progress marker stored on the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Idle,
    Estimated,
    Running,
    Completed,
}

string_enum!(StageStatus, "stage status", {
    Idle => "idle",
    Estimated => "estimated",
    Running => "running",
    Completed => "completed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    None,
    Unverified,
    Valid,
    Invalid,
    Risky,
    CatchAll,
    Unknown,
}

string_enum!(EmailStatus, "email status", {
    None => "none",
    Unverified => "unverified",
    Valid => "valid",
    Invalid => "invalid",
    Risky => "risky",
    CatchAll => "catch_all",
    Unknown => "unknown",
});

impl EmailStatus {
    /// Lenient mapping of a verifier's status string.
    ///
    /// Anything unrecognized is `Unknown` rather than an error.
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "valid" | "deliverable" => EmailStatus::Valid,
            "invalid" | "undeliverable" => EmailStatus::Invalid,
            "risky" => EmailStatus::Risky,
            "catch_all" | "catchall" | "accept_all" => EmailStatus::CatchAll,
            _ => EmailStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailSource {
    FoundOnSite,
    GeneratedPattern,
}

string_enum!(EmailSource, "email source", {
    FoundOnSite => "found_on_site",
    GeneratedPattern => "generated_pattern",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentMode {
    #[default]
    Budget,
    Deep,
}

string_enum!(EnrichmentMode, "enrichment mode", {
    Budget => "budget",
    Deep => "deep",
});

/// The four batch stages of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Collect,
    Verification,
    Enrichment,
    AdsScan,
}

string_enum!(Stage, "stage", {
    Collect => "collect",
    Verification => "verification",
    Enrichment => "enrichment",
    AdsScan => "ads_scan",
});

impl Stage {
    /// Spend-capped stages, in pipeline order.
    pub const SPEND_CAPPED: [Stage; 3] = [Stage::Verification, Stage::Enrichment, Stage::AdsScan];

    /// Small integer folded into the per-job advisory lock key.
    #[must_use]
    pub fn lock_code(self) -> i64 {
        match self {
            Stage::Collect => 1,
            Stage::Verification => 2,
            Stage::Enrichment => 3,
            Stage::AdsScan => 4,
        }
    }

    #[must_use]
    pub fn is_spend_capped(self) -> bool {
        !matches!(self, Stage::Collect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_values_round_trip_through_column_text() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert_eq!("ads_scan".parse::<Stage>().unwrap(), Stage::AdsScan);
        assert_eq!(
            "catch_all".parse::<EmailStatus>().unwrap(),
            EmailStatus::CatchAll
        );
    }

    #[test]
    fn unknown_value_names_the_kind() {
        let err = "paused".parse::<JobStatus>().unwrap_err();
        assert_eq!(err.kind, "job status");
        assert_eq!(err.to_string(), "unknown job status value: 'paused'");
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
    }

    #[test]
    fn provider_email_status_is_lenient() {
        assert_eq!(EmailStatus::from_provider("VALID"), EmailStatus::Valid);
        assert_eq!(EmailStatus::from_provider("catch-all"), EmailStatus::CatchAll);
        assert_eq!(
            EmailStatus::from_provider("undeliverable"),
            EmailStatus::Invalid
        );
        assert_eq!(EmailStatus::from_provider("???"), EmailStatus::Unknown);
    }

    #[test]
    fn lock_codes_are_distinct() {
        let mut codes: Vec<i64> = [
            Stage::Collect,
            Stage::Verification,
            Stage::Enrichment,
            Stage::AdsScan,
        ]
        .iter()
        .map(|s| s.lock_code())
        .collect();
        codes.dedup();
        assert_eq!(codes.len(), 4);
    }
}
