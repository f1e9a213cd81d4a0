pub mod app_config;
pub mod config;
pub mod dedup;
pub mod email;
pub mod estimate;
pub mod lead;
pub mod plan;
pub mod scoring;
pub mod segments;
pub mod status;
pub mod zips;

use thiserror::Error;

pub use app_config::{AdsProviderConfig, AppConfig, Environment, DEFAULT_ZIP_DATASET_URL};
pub use config::{load_app_config, load_app_config_from_env};
pub use dedup::{choose_primary_contact, identity_hash, title_rank, TITLE_PRIORITY};
pub use email::{build_email_candidates, split_full_name, website_domain, MAX_EMAIL_CANDIDATES};
pub use estimate::{
    estimate_ads_scan_cost, estimate_collect_api_cost, estimate_enrichment_cost,
    estimate_verification_cost, AdsScanEstimate, CollectApiCost, EnrichmentEstimate,
    EnrichmentPricing, VerificationEstimate,
};
pub use lead::{CrawlResult, CrawledContact, CrawledSignal, LeadCandidate};
pub use plan::{
    load_plan_file, parse_plan, read_plan_file, CollectionToggles, GeoMode, GeoParams, JobPlan, PlanError,
};
pub use scoring::{
    CompanyProfile, ContactScorer, HeuristicContactScorer, HeuristicSegmentScorer, SegmentFlag,
    SegmentScorer, SegmentScores, SIGNAL_IN_BUSINESS_20_PLUS, SIGNAL_LEAD_CONFIDENCE,
    SIGNAL_MULTI_LOCATION_MEDICAL,
};
pub use segments::{build_geo_segments, build_query, GeoSegment, SegmentCursor};
pub use status::{
    EmailSource, EmailStatus, EnrichmentMode, FailureReason, JobStatus, Stage, StageStatus,
    StatusParseError,
};
pub use zips::{group_zips_by_state, parse_state_code, InvalidStateCode, US_STATE_CODES};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
