use serde::{Deserialize, Serialize};

/// A business as returned by the directory search, normalized for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadCandidate {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub external_place_id: Option<String>,
    pub maps_url: Option<String>,
    pub source_query: String,
    pub source_geo_label: String,
}

impl LeadCandidate {
    /// Dedup key of this candidate; see [`crate::identity_hash`].
    #[must_use]
    pub fn identity_hash(&self) -> String {
        crate::dedup::identity_hash(
            &self.name,
            self.address.as_deref(),
            self.phone.as_deref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawledContact {
    pub full_name: String,
    pub title: Option<String>,
    pub email: Option<String>,
    pub evidence_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawledSignal {
    pub signal_type: String,
    pub signal_value: serde_json::Value,
    pub evidence_url: Option<String>,
}

/// Everything a best-effort crawl of a lead's website turned up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub contacts: Vec<CrawledContact>,
    pub contact_form_url: Option<String>,
    pub signals: Vec<CrawledSignal>,
    pub pages_fetched: usize,
}
