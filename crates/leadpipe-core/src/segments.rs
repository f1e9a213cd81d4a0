//! Geo segmentation and the keyword × segment cursor.
//!
//! A job walks every keyword for the current segment before moving to the
//! next segment. The cursor is the only collection state persisted between
//! batches besides the progress count.

use serde::{Deserialize, Serialize};

use crate::plan::{GeoMode, JobPlan};

pub const DEFAULT_RADIUS_CENTER: &str = "Durham, NC";

const NC_MAJOR_CITIES: &[&str] = &[
    "Charlotte, NC",
    "Raleigh, NC",
    "Greensboro, NC",
    "Durham, NC",
    "Winston-Salem, NC",
    "Fayetteville, NC",
    "Cary, NC",
    "Wilmington, NC",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoSegment {
    /// Stable label recorded on leads and run-log entries, e.g. `zip:27701`.
    pub label: String,
    /// Free text appended to the search query.
    pub location_text: String,
}

impl GeoSegment {
    fn new(prefix: &str, location: &str) -> Self {
        Self {
            label: format!("{prefix}:{location}"),
            location_text: location.to_string(),
        }
    }
}

/// Expand a plan's geo mode into its ordered list of search segments.
///
/// Blank entries are skipped; an empty result means the plan cannot run.
#[must_use]
pub fn build_geo_segments(plan: &JobPlan) -> Vec<GeoSegment> {
    let params = &plan.geo_params;
    match plan.geo_mode {
        GeoMode::Radius => {
            let center = params
                .center
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_RADIUS_CENTER);
            vec![GeoSegment::new("radius", center)]
        }
        GeoMode::ZipSweep => params
            .zips
            .iter()
            .map(|z| z.trim())
            .filter(|z| !z.is_empty())
            .map(|z| GeoSegment::new("zip", z))
            .collect(),
        GeoMode::State => {
            let cities: Vec<&str> = params
                .cities
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .collect();
            if !cities.is_empty() {
                return cities
                    .into_iter()
                    .map(|c| GeoSegment::new("city", c))
                    .collect();
            }
            let state = params
                .state_code
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("NC")
                .to_ascii_uppercase();
            if state == "NC" {
                NC_MAJOR_CITIES
                    .iter()
                    .map(|c| GeoSegment::new("city", c))
                    .collect()
            } else {
                vec![GeoSegment::new("state", &state)]
            }
        }
    }
}

/// Position within the keyword × segment grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCursor {
    pub segment_offset: usize,
    pub keyword_offset: usize,
}

impl SegmentCursor {
    #[must_use]
    pub fn new(segment_offset: usize, keyword_offset: usize) -> Self {
        Self {
            segment_offset,
            keyword_offset,
        }
    }

    /// Step to the next keyword, wrapping into the next segment.
    #[must_use]
    pub fn advance(self, keyword_count: usize) -> Self {
        let next_keyword = self.keyword_offset + 1;
        if next_keyword >= keyword_count.max(1) {
            Self::new(self.segment_offset + 1, 0)
        } else {
            Self::new(self.segment_offset, next_keyword)
        }
    }

    /// True once every segment has been searched.
    #[must_use]
    pub fn is_exhausted(self, segment_count: usize) -> bool {
        self.segment_offset >= segment_count
    }

    /// The keyword and segment this cursor points at, if any remain.
    ///
    /// A keyword offset past the end (e.g. after the plan was edited) is
    /// clamped to the first keyword.
    #[must_use]
    pub fn resolve<'a>(
        self,
        keywords: &'a [String],
        segments: &'a [GeoSegment],
    ) -> Option<(&'a str, &'a GeoSegment)> {
        let segment = segments.get(self.segment_offset)?;
        let keyword = keywords
            .get(self.keyword_offset)
            .or_else(|| keywords.first())?;
        Some((keyword.as_str(), segment))
    }
}

/// Search query sent to the directory for one grid cell.
#[must_use]
pub fn build_query(keyword: &str, segment: &GeoSegment) -> String {
    format!("{keyword} in {}", segment.location_text)
}
