//! Contact and company scoring used by the enrichment stage.
//!
//! The heuristics here are keyword tables. The traits exist so a model-backed
//! scorer can replace them without touching the stage driver.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const SIGNAL_IN_BUSINESS_20_PLUS: &str = "segment_in_business_20_plus";
pub const SIGNAL_MULTI_LOCATION_MEDICAL: &str = "segment_multi_location_medical_practice";
pub const SIGNAL_LEAD_CONFIDENCE: &str = "enrichment_lead_confidence";

static MEDICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(clinic|medical|health|pediatrics|dental|urgent care|orthopedic|wellness)")
        .expect("valid regex")
});
static MULTI_LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(locations|our offices|find a location|suite\s+\d+)").expect("valid regex")
});
static ESTABLISHED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(since\s+(19\d{2}|200[0-5])|established|est\.\s*(19\d{2}|200[0-5])|decades)")
        .expect("valid regex")
});

/// Company-level text the segment scorer looks at.
#[derive(Debug, Clone, Default)]
pub struct CompanyProfile<'a> {
    pub name: &'a str,
    pub address: Option<&'a str>,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub website: Option<&'a str>,
}

impl CompanyProfile<'_> {
    fn haystack(&self) -> String {
        [
            Some(self.name),
            self.address,
            self.city,
            self.state,
            self.website,
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentFlag {
    pub value: bool,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentScores {
    pub in_business_20_plus: SegmentFlag,
    pub multi_location_medical_practice: SegmentFlag,
}

/// Confidence that a contact is a useful decision maker, in `[0, 1]`.
pub trait ContactScorer: Send + Sync {
    fn score(&self, title: Option<&str>) -> f64;
}

/// Company segmentation flags.
pub trait SegmentScorer: Send + Sync {
    fn score(&self, company: &CompanyProfile<'_>) -> SegmentScores;
}

/// Title-tier contact scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicContactScorer;

impl ContactScorer for HeuristicContactScorer {
    fn score(&self, title: Option<&str>) -> f64 {
        let title = title.unwrap_or_default().to_lowercase();
        let has = |needle: &str| title.contains(needle);

        if has("managing partner") || has("founder") || has("owner") || has("principal") {
            0.92
        } else if has("partner") {
            0.86
        } else if has("attorney") {
            0.8
        } else if has("manager") || has("coordinator") {
            0.65
        } else {
            0.55
        }
    }
}

/// Keyword co-occurrence segment scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSegmentScorer;

impl SegmentScorer for HeuristicSegmentScorer {
    fn score(&self, company: &CompanyProfile<'_>) -> SegmentScores {
        let text = company.haystack();

        let in_business_20_plus = if ESTABLISHED_RE.is_match(&text) {
            SegmentFlag {
                value: true,
                confidence: 0.61,
            }
        } else {
            SegmentFlag {
                value: false,
                confidence: 0.42,
            }
        };

        let medical = MEDICAL_RE.is_match(&text);
        let multi_location = MULTI_LOCATION_RE.is_match(&text);
        let multi_location_medical_practice = match (medical, multi_location) {
            (true, true) => SegmentFlag {
                value: true,
                confidence: 0.68,
            },
            (true, false) => SegmentFlag {
                value: false,
                confidence: 0.52,
            },
            _ => SegmentFlag {
                value: false,
                confidence: 0.28,
            },
        };

        SegmentScores {
            in_business_20_plus,
            multi_location_medical_practice,
        }
    }
}
