//! Client for the USPS ZIP code dataset: a single JSON object keyed by ZIP,
//! each entry carrying at least a `state` field.
//!
//! The dataset is fetched once per [`ZipDirectory`] and grouped by state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Mutex;

use crate::error::ProviderError;

type ZipsByState = BTreeMap<&'static str, Vec<String>>;

pub struct ZipDirectory {
    client: Client,
    dataset_url: String,
    cache: Mutex<Option<Arc<ZipsByState>>>,
}

impl ZipDirectory {
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        dataset_url: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: crate::build_http_client(timeout_secs, user_agent)?,
            dataset_url: dataset_url.to_owned(),
            cache: Mutex::new(None),
        })
    }

    /// Sorted five-digit ZIPs for a state code already checked by
    /// [`leadpipe_core::parse_state_code`]. Unknown states yield an empty list.
    ///
    /// # Errors
    ///
    /// - [`ProviderError::UnexpectedStatus`] if the dataset responds non-2xx.
    /// - [`ProviderError::Http`] / [`ProviderError::Deserialize`] on transport
    ///   or shape failures.
    pub async fn zips_for_state(&self, state: &str) -> Result<Vec<String>, ProviderError> {
        let by_state = self.dataset().await?;
        Ok(by_state.get(state).cloned().unwrap_or_default())
    }

    async fn dataset(&self) -> Result<Arc<ZipsByState>, ProviderError> {
        let mut cache = self.cache.lock().await;
        if let Some(by_state) = cache.as_ref() {
            return Ok(Arc::clone(by_state));
        }

        let by_state = Arc::new(self.fetch().await?);
        tracing::info!(
            url = %self.dataset_url,
            states = by_state.len(),
            "ZIP dataset loaded"
        );
        *cache = Some(Arc::clone(&by_state));
        Ok(by_state)
    }

    async fn fetch(&self) -> Result<ZipsByState, ProviderError> {
        let response = self.client.get(&self.dataset_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.dataset_url.clone(),
            });
        }
        let text = response.text().await?;
        let raw: HashMap<String, serde_json::Value> =
            serde_json::from_str(&text).map_err(|e| ProviderError::Deserialize {
                context: "ZIP dataset".to_string(),
                source: e,
            })?;

        Ok(leadpipe_core::group_zips_by_state(raw.iter().filter_map(
            |(zip, detail)| {
                detail
                    .get("state")
                    .and_then(serde_json::Value::as_str)
                    .map(|state| (zip.as_str(), state))
            },
        )))
    }
}
