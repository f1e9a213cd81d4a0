//! Collection plan: what to search for, where, and how much.
//!
//! Plans arrive as JSON on the API or as YAML/JSON template files on the CLI.
//! Both go through [`parse_plan`] so validation is identical.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::segments::build_geo_segments;

const DEFAULT_MAX_SEARCHES: u32 = 100;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan must contain at least one non-blank keyword")]
    NoKeywords,

    #[error("target_firm_count must be at least 1")]
    InvalidTarget,

    #[error("max_searches must be at least 1")]
    InvalidMaxSearches,

    #[error("geo mode '{0}' produced no search segments")]
    NoSegments(GeoMode),

    #[error("failed to parse plan: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to read plan file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoMode {
    #[default]
    Radius,
    ZipSweep,
    State,
}

impl std::fmt::Display for GeoMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoMode::Radius => write!(f, "radius"),
            GeoMode::ZipSweep => write!(f, "zip_sweep"),
            GeoMode::State => write!(f, "state"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoParams {
    /// Center location for radius mode, e.g. `"Durham, NC"`.
    #[serde(default)]
    pub center: Option<String>,
    #[serde(default)]
    pub zips: Vec<String>,
    #[serde(default)]
    pub state_code: Option<String>,
    /// Explicit city list for state mode.
    #[serde(default)]
    pub cities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionToggles {
    #[serde(default = "default_true")]
    pub crawl_websites: bool,
    #[serde(default)]
    pub deep_crawl: bool,
    /// Re-attribute leads already collected by another job instead of skipping them.
    #[serde(default)]
    pub allow_reinclude: bool,
}

impl Default for CollectionToggles {
    fn default() -> Self {
        Self {
            crawl_websites: true,
            deep_crawl: false,
            allow_reinclude: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPlan {
    pub business_type: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub geo_mode: GeoMode,
    #[serde(default)]
    pub geo_params: GeoParams,
    pub target_firm_count: u32,
    #[serde(default = "default_max_searches")]
    pub max_searches: u32,
    #[serde(default)]
    pub toggles: CollectionToggles,
}

impl JobPlan {
    /// The state whose ZIPs should fill this plan: a zip sweep that names a
    /// state but lists no ZIPs.
    #[must_use]
    pub fn state_needing_zips(&self) -> Option<&str> {
        if self.geo_mode != GeoMode::ZipSweep
            || self.geo_params.zips.iter().any(|z| !z.trim().is_empty())
        {
            return None;
        }
        self.geo_params
            .state_code
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn with_zips(mut self, zips: Vec<String>) -> Self {
        self.geo_params.zips = zips;
        self
    }

    /// Trims keywords, drops blank ones, and checks the plan can drive a job.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] if no keyword survives, the target or search
    /// budget is zero, or the geo mode yields no segments.
    pub fn validated(mut self) -> Result<Self, PlanError> {
        self.keywords = self
            .keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        self.business_type = self.business_type.trim().to_string();

        if self.keywords.is_empty() {
            return Err(PlanError::NoKeywords);
        }
        if self.target_firm_count == 0 {
            return Err(PlanError::InvalidTarget);
        }
        if self.max_searches == 0 {
            return Err(PlanError::InvalidMaxSearches);
        }
        if build_geo_segments(&self).is_empty() {
            return Err(PlanError::NoSegments(self.geo_mode));
        }
        Ok(self)
    }
}

/// Parse and validate a plan from YAML or JSON text.
///
/// # Errors
///
/// Returns [`PlanError::Parse`] for malformed input, or any validation error
/// from [`JobPlan::validated`].
pub fn parse_plan(text: &str) -> Result<JobPlan, PlanError> {
    let plan: JobPlan = serde_yaml::from_str(text)?;
    plan.validated()
}

/// Read a plan template from disk.
///
/// # Errors
///
/// Returns [`PlanError::Io`] if the file cannot be read, otherwise the same
/// errors as [`parse_plan`].
pub fn load_plan_file(path: &Path) -> Result<JobPlan, PlanError> {
    read_plan_file(path)?.validated()
}

/// Read a plan from disk without validating it, for callers that still
/// need to fill in ZIPs for a state-only zip sweep.
///
/// # Errors
///
/// Returns [`PlanError::Io`] or [`PlanError::Parse`].
pub fn read_plan_file(path: &Path) -> Result<JobPlan, PlanError> {
    let text = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_yaml::from_str(&text)?)
}

fn default_true() -> bool {
    true
}

fn default_max_searches() -> u32 {
    DEFAULT_MAX_SEARCHES
}
