//! Client for the Google Places text-search and details endpoints.
//!
//! Every response carries a `status` field; `OK` and `ZERO_RESULTS` are
//! successes and anything else is surfaced as [`ProviderError::Api`].

use leadpipe_core::LeadCandidate;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";
const DETAILS_FIELDS: &str =
    "place_id,name,formatted_address,website,formatted_phone_number,url,address_component";
const PROVIDER: &str = "google_places";

/// How many text-search hits a collection batch looks up in detail.
pub const BATCH_PLACE_LIMIT: usize = 15;

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceSummary {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub formatted_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceDetails {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub formatted_phone_number: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    #[serde(default)]
    results: Vec<PlaceSummary>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    result: Option<PlaceDetails>,
}

/// Client for the Places web service.
pub struct PlacesClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl PlacesClient {
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(api_key: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the `reqwest::Client` cannot be built.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: crate::build_http_client(timeout_secs, user_agent)?,
            api_key: api_key.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Runs a free-text search such as `"estate attorney in Durham, NC"`.
    ///
    /// # Errors
    ///
    /// - [`ProviderError::UnexpectedStatus`] on a non-2xx response.
    /// - [`ProviderError::Api`] if the payload status is not `OK`/`ZERO_RESULTS`.
    /// - [`ProviderError::Http`] / [`ProviderError::Deserialize`] on transport
    ///   or shape failures.
    pub async fn text_search(&self, query: &str) -> Result<Vec<PlaceSummary>, ProviderError> {
        let url = self.build_url("textsearch/json", &[("query", query)])?;
        let body = self.request_json(&url).await?;
        let parsed: TextSearchResponse =
            serde_json::from_value(body).map_err(|e| ProviderError::Deserialize {
                context: format!("textsearch(query={query})"),
                source: e,
            })?;
        Ok(parsed.results)
    }

    /// Fetches contact details for one place.
    ///
    /// # Errors
    ///
    /// Same as [`PlacesClient::text_search`]; additionally
    /// [`ProviderError::Api`] when the response carries no `result`.
    pub async fn place_details(&self, place_id: &str) -> Result<PlaceDetails, ProviderError> {
        let url = self.build_url(
            "details/json",
            &[("place_id", place_id), ("fields", DETAILS_FIELDS)],
        )?;
        let body = self.request_json(&url).await?;
        let parsed: DetailsResponse =
            serde_json::from_value(body).map_err(|e| ProviderError::Deserialize {
                context: format!("details(place_id={place_id})"),
                source: e,
            })?;
        parsed.result.ok_or_else(|| ProviderError::Api {
            provider: PROVIDER.to_string(),
            message: format!("no details returned for place {place_id}"),
        })
    }

    fn build_url(&self, path: &str, extra: &[(&str, &str)]) -> Result<Url, ProviderError> {
        let raw = format!("{}/{path}", self.base_url);
        let mut url = Url::parse(&raw).map_err(|e| ProviderError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in extra {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("key", &self.api_key);
        }
        Ok(url)
    }

    async fn request_json(&self, url: &Url) -> Result<serde_json::Value, ProviderError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::UnexpectedStatus {
                status: status.as_u16(),
                url: redact_key(url),
            });
        }
        let text = response.text().await?;
        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| ProviderError::Deserialize {
                context: redact_key(url),
                source: e,
            })?;
        check_status(&body)?;
        Ok(body)
    }
}

fn check_status(body: &serde_json::Value) -> Result<(), ProviderError> {
    let envelope: Envelope =
        serde_json::from_value(body.clone()).map_err(|e| ProviderError::Deserialize {
            context: "places status envelope".to_string(),
            source: e,
        })?;
    match envelope.status.as_str() {
        "OK" | "ZERO_RESULTS" => Ok(()),
        other => Err(ProviderError::Api {
            provider: PROVIDER.to_string(),
            message: match envelope.error_message {
                Some(msg) => format!("{other}: {msg}"),
                None => other.to_string(),
            },
        }),
    }
}

/// Request URL without the API key, for error messages and logs.
fn redact_key(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}

fn address_part(components: &[AddressComponent], kind: &str) -> Option<String> {
    components
        .iter()
        .find(|c| c.types.iter().any(|t| t == kind))
        .map(|c| {
            if c.short_name.is_empty() {
                c.long_name.clone()
            } else {
                c.short_name.clone()
            }
        })
}

/// Normalizes a details record into a storable [`LeadCandidate`].
#[must_use]
pub fn to_lead_candidate(details: &PlaceDetails, source_query: &str, geo_label: &str) -> LeadCandidate {
    LeadCandidate {
        name: details.name.clone(),
        address: details.formatted_address.clone(),
        city: address_part(&details.address_components, "locality"),
        state: address_part(&details.address_components, "administrative_area_level_1"),
        zip: address_part(&details.address_components, "postal_code"),
        phone: details.formatted_phone_number.clone(),
        website: details.website.clone(),
        external_place_id: Some(details.place_id.clone()),
        maps_url: details.url.clone(),
        source_query: source_query.to_string(),
        source_geo_label: geo_label.to_string(),
    }
}
