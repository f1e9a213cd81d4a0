//! Ads-library lookups: how actively a company advertises over a window.
//!
//! Two backends are supported. `dataforseo` looks the company up as a Google
//! Ads advertiser and, when a domain comes back, counts its ads over the
//! period. `custom_http` POSTs the company to a caller-run endpoint that
//! answers with the counts directly.

use chrono::NaiveDate;
use leadpipe_core::AdsProviderConfig;
use reqwest::{Client, Response};
use serde_json::{json, Value};

use crate::error::ProviderError;

const DATAFORSEO_BASE_URL: &str = "https://api.dataforseo.com";
const ADVERTISERS_PATH: &str = "/v3/serp/google/ads_advertisers/live/advanced";
const ADS_SEARCH_PATH: &str = "/v3/serp/google/ads_search/live/advanced";

/// What to look up, and for which window.
#[derive(Debug, Clone)]
pub struct AdsLookup<'a> {
    pub company_name: &'a str,
    pub website: Option<&'a str>,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub period_days: u32,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdsLookupResult {
    pub advertiser_name: String,
    pub ads_count_active: i32,
    pub ads_count_in_period: i32,
    pub first_seen_at: Option<NaiveDate>,
    pub last_seen_at: Option<NaiveDate>,
    pub evidence_url: Option<String>,
    pub raw: Value,
}

enum Backend {
    DataForSeo {
        login: String,
        password: String,
        location_code: u32,
        base_url: String,
    },
    CustomHttp {
        url: String,
        api_key: Option<String>,
    },
}

pub struct AdsLibraryClient {
    client: Client,
    backend: Backend,
}

impl AdsLibraryClient {
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        config: &AdsProviderConfig,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ProviderError> {
        Self::with_base_url(config, timeout_secs, user_agent, DATAFORSEO_BASE_URL)
    }

    /// Like [`AdsLibraryClient::new`] but sends `dataforseo` requests to
    /// `base_url` (for testing with wiremock). `custom_http` always uses its
    /// configured URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the `reqwest::Client` cannot be built.
    pub fn with_base_url(
        config: &AdsProviderConfig,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, ProviderError> {
        let backend = match config {
            AdsProviderConfig::DataForSeo {
                login,
                password,
                location_code,
            } => Backend::DataForSeo {
                login: login.clone(),
                password: password.clone(),
                location_code: *location_code,
                base_url: base_url.trim_end_matches('/').to_owned(),
            },
            AdsProviderConfig::CustomHttp { url, api_key } => Backend::CustomHttp {
                url: url.clone(),
                api_key: api_key.clone(),
            },
        };
        Ok(Self {
            client: crate::build_http_client(timeout_secs, user_agent)?,
            backend,
        })
    }

    /// Name recorded on each observation, e.g. `"dataforseo"`.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        match self.backend {
            Backend::DataForSeo { .. } => "dataforseo",
            Backend::CustomHttp { .. } => "custom_http",
        }
    }

    /// # Errors
    ///
    /// - [`ProviderError::Api`] if the provider answers non-2xx; the message
    ///   is the provider's `error` field when present.
    /// - [`ProviderError::Http`] on network failure.
    pub async fn lookup(&self, input: &AdsLookup<'_>) -> Result<AdsLookupResult, ProviderError> {
        match &self.backend {
            Backend::DataForSeo {
                login,
                password,
                location_code,
                base_url,
            } => {
                self.lookup_dataforseo(input, login, password, *location_code, base_url)
                    .await
            }
            Backend::CustomHttp { url, api_key } => {
                self.lookup_custom_http(input, url, api_key.as_deref()).await
            }
        }
    }

    async fn lookup_dataforseo(
        &self,
        input: &AdsLookup<'_>,
        login: &str,
        password: &str,
        location_code: u32,
        base_url: &str,
    ) -> Result<AdsLookupResult, ProviderError> {
        let location_name = [input.city, input.state, Some("United States")]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        let body = json!([{
            "keyword": input.company_name,
            "location_name": location_name,
            "location_code": location_code,
            "language_name": "English",
            "depth": 100
        }]);

        let response = self
            .client
            .post(format!("{base_url}{ADVERTISERS_PATH}"))
            .basic_auth(login, Some(password))
            .json(&body)
            .send()
            .await?;
        let mut payload = read_payload(response, "dataforseo").await?;

        let items = first_result_items(&payload);
        let preferred = items
            .iter()
            .find(|item| {
                let advertiser = first_str(
                    item,
                    &["advertiser_name", "advertiser", "domain", "title"],
                )
                .unwrap_or_default();
                looks_like_company_match(input.company_name, advertiser)
            })
            .or_else(|| items.first())
            .cloned()
            .unwrap_or_else(|| json!({}));

        let advertiser_name = first_str(&preferred, &["advertiser_name", "advertiser", "domain"])
            .unwrap_or(input.company_name)
            .to_string();
        let mut ads_in_period = first_count(
            &preferred,
            &[
                "ads_count",
                "approx_ads_count",
                "ads_count_in_period",
                "ad_count",
                "results_count",
            ],
        )
        .unwrap_or(0);
        let ads_active = first_count(
            &preferred,
            &["ads_count_active", "active_ads", "live_ads"],
        )
        .unwrap_or(ads_in_period);
        let mut first_seen = first_date(&preferred, &["first_seen_at", "first_shown", "date_from"]);
        let mut last_seen = first_date(&preferred, &["last_seen_at", "last_shown", "date_to"]);
        let evidence_url = first_str(&preferred, &["url", "source_url"]).map(str::to_string);

        if let Some(domain) = preferred.get("domain").and_then(Value::as_str) {
            let search_body = json!([{
                "location_code": location_code,
                "language_name": "English",
                "target": domain,
                "platform": "all",
                "format": "all",
                "date_from": input.period_start.to_string(),
                "date_to": input.period_end.to_string(),
                "depth": 100
            }]);
            let response = self
                .client
                .post(format!("{base_url}{ADS_SEARCH_PATH}"))
                .basic_auth(login, Some(password))
                .json(&search_body)
                .send()
                .await?;

            // The ads search only refines the advertiser numbers.
            if response.status().is_success() {
                let text = response.text().await?;
                let search_payload = crate::lenient_json(&text);
                let search_items = first_result_items(&search_payload);
                let result = first_result(&search_payload);
                let counted = [
                    result.and_then(|r| count_value(r.get("items_count"))),
                    result.and_then(|r| count_value(r.get("results_count"))),
                    Some(i32::try_from(search_items.len()).unwrap_or(i32::MAX)),
                ]
                .into_iter()
                .flatten()
                .max()
                .unwrap_or(0);
                if counted > 0 {
                    ads_in_period = counted;
                }

                let mut dates: Vec<NaiveDate> = search_items
                    .iter()
                    .flat_map(|item| {
                        [
                            first_date(item, &["first_seen_at", "first_shown", "date_from"]),
                            first_date(item, &["last_seen_at", "last_shown", "date_to"]),
                        ]
                    })
                    .flatten()
                    .collect();
                dates.sort_unstable();
                if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
                    first_seen = Some(*first);
                    last_seen = Some(*last);
                }

                if let Some(obj) = payload.as_object_mut() {
                    obj.insert("ads_search".to_string(), search_payload);
                }
            } else {
                tracing::debug!(domain, status = %response.status(), "dataforseo ads search skipped");
            }
        }

        Ok(AdsLookupResult {
            advertiser_name,
            ads_count_active: ads_active,
            ads_count_in_period: ads_in_period,
            first_seen_at: first_seen,
            last_seen_at: last_seen,
            evidence_url,
            raw: payload,
        })
    }

    async fn lookup_custom_http(
        &self,
        input: &AdsLookup<'_>,
        url: &str,
        api_key: Option<&str>,
    ) -> Result<AdsLookupResult, ProviderError> {
        let mut request = self.client.post(url).json(&json!({
            "company_name": input.company_name,
            "website": input.website,
            "city": input.city,
            "state": input.state,
            "period_days": input.period_days,
        }));
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }
        let payload = read_payload(request.send().await?, "custom_http").await?;

        Ok(AdsLookupResult {
            advertiser_name: first_str(&payload, &["advertiser_name"])
                .unwrap_or(input.company_name)
                .to_string(),
            ads_count_active: count_value(payload.get("ads_count_active")).unwrap_or(0),
            ads_count_in_period: count_value(payload.get("ads_count_in_period")).unwrap_or(0),
            first_seen_at: first_date(&payload, &["first_seen_at"]),
            last_seen_at: first_date(&payload, &["last_seen_at"]),
            evidence_url: first_str(&payload, &["evidence_url"]).map(str::to_string),
            raw: payload,
        })
    }
}

/// Reads the body leniently and turns a non-2xx status into an API error
/// carrying the provider's `error` message when it sent one.
async fn read_payload(response: Response, provider: &str) -> Result<Value, ProviderError> {
    let status = response.status();
    let text = response.text().await?;
    let payload = crate::lenient_json(&text);
    if !status.is_success() {
        let message = payload
            .get("error")
            .and_then(Value::as_str)
            .map_or_else(|| format!("request failed ({})", status.as_u16()), str::to_string);
        return Err(ProviderError::Api {
            provider: provider.to_string(),
            message,
        });
    }
    Ok(payload)
}

fn first_result(payload: &Value) -> Option<&Value> {
    payload
        .get("tasks")?
        .as_array()?
        .first()?
        .get("result")?
        .as_array()?
        .first()
}

fn first_result_items(payload: &Value) -> Vec<Value> {
    first_result(payload)
        .and_then(|r| r.get("items"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter(|i| i.is_object()).cloned().collect())
        .unwrap_or_default()
}

fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| value.get(k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

/// A non-negative count from a number or numeric string.
#[allow(clippy::cast_possible_truncation)]
fn count_value(value: Option<&Value>) -> Option<i32> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.clamp(0.0, f64::from(i32::MAX)) as i32)
}

fn first_count(value: &Value, keys: &[&str]) -> Option<i32> {
    keys.iter().find_map(|k| count_value(value.get(k)))
}

/// First parseable `YYYY-MM-DD` prefix among `keys`.
fn first_date(value: &Value, keys: &[&str]) -> Option<NaiveDate> {
    keys.iter().find_map(|k| {
        let raw = value.get(k)?.as_str()?;
        let day = raw.get(..10)?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    })
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn looks_like_company_match(company_name: &str, candidate: &str) -> bool {
    let a = normalize_name(company_name);
    let b = normalize_name(candidate);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}
