//! Client for the Anymail Search email verification endpoint.

use leadpipe_core::EmailStatus;
use reqwest::Client;

use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.anymailsearch.com";

/// Provider name recorded on every verification row.
pub const VERIFIER_PROVIDER: &str = "anymailsearch";

/// One verification verdict plus the raw provider body.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailVerification {
    pub status: EmailStatus,
    pub confidence: Option<f64>,
    pub provider_response: serde_json::Value,
}

pub struct EmailVerifierClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl EmailVerifierClient {
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

    /// Verifies a single address. A missing `status` reads as `unknown`.
    ///
    /// # Errors
    ///
    /// - [`ProviderError::UnexpectedStatus`] on a non-2xx response.
    /// - [`ProviderError::Http`] / [`ProviderError::Deserialize`] on transport
    ///   or shape failures.
    pub async fn verify(&self, email: &str) -> Result<EmailVerification, ProviderError> {
        let url = format!("{}/v1/verify", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let text = response.text().await?;
        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| ProviderError::Deserialize {
                context: format!("verify(email={email})"),
                source: e,
            })?;
        // Tolerate odd shapes: the raw body is kept as evidence either way.
        let status = body
            .get("status")
            .and_then(serde_json::Value::as_str)
            .map_or(EmailStatus::Unknown, EmailStatus::from_provider);
        let confidence = body.get("confidence").and_then(serde_json::Value::as_f64);

        Ok(EmailVerification {
            status,
            confidence,
            provider_response: body,
        })
    }
}
