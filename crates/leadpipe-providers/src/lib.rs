//! HTTP adapters for the external services the pipeline pays for or crawls:
//! directory search, company websites, email verification, the ads library
//! and the USPS ZIP dataset.

pub mod ads;
pub mod crawl;
pub mod error;
pub mod places;
pub mod verifier;
pub mod zips;

pub use ads::{AdsLibraryClient, AdsLookup, AdsLookupResult};
pub use crawl::SiteCrawler;
pub use error::ProviderError;
pub use places::{to_lead_candidate, PlaceDetails, PlaceSummary, PlacesClient, BATCH_PLACE_LIMIT};
pub use verifier::{EmailVerification, EmailVerifierClient, VERIFIER_PROVIDER};
pub use zips::ZipDirectory;

use std::time::Duration;

use reqwest::Client;

/// Builds the shared `reqwest` client configuration used by every adapter.
pub(crate) fn build_http_client(
    timeout_secs: u64,
    user_agent: &str,
) -> Result<Client, ProviderError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()?)
}

/// Parses a response body as JSON, falling back to `{"raw_text": ..}` for
/// non-JSON bodies so the text can still be stored as provider evidence.
pub(crate) fn lenient_json(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "raw_text": text }))
}
