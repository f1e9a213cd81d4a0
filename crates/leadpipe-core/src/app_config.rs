use std::net::SocketAddr;

use rust_decimal::Decimal;

/// USPS ZIP dataset keyed by ZIP, each entry carrying its `state`.
pub const DEFAULT_ZIP_DATASET_URL: &str =
    "https://cdn.statically.io/gh/pseudosavant/USPSZIPCodes/main/dist/ZIPCodes.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which ads-library backend the ads-scan stage talks to.
#[derive(Clone, PartialEq, Eq)]
pub enum AdsProviderConfig {
    DataForSeo {
        login: String,
        password: String,
        location_code: u32,
    },
    CustomHttp {
        url: String,
        api_key: Option<String>,
    },
}

impl AdsProviderConfig {
    /// Provider name recorded on each observation row.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            AdsProviderConfig::DataForSeo { .. } => "dataforseo",
            AdsProviderConfig::CustomHttp { .. } => "custom_http",
        }
    }
}

impl std::fmt::Debug for AdsProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdsProviderConfig::DataForSeo { location_code, .. } => f
                .debug_struct("DataForSeo")
                .field("login", &"[redacted]")
                .field("password", &"[redacted]")
                .field("location_code", location_code)
                .finish(),
            AdsProviderConfig::CustomHttp { url, api_key } => f
                .debug_struct("CustomHttp")
                .field("url", url)
                .field("api_key", &api_key.as_ref().map(|_| "[redacted]"))
                .finish(),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub places_api_key: Option<String>,
    pub places_text_search_unit_cost_usd: Decimal,
    pub places_details_unit_cost_usd: Decimal,
    pub anymail_api_key: Option<String>,
    pub verification_unit_cost_usd: Decimal,
    pub verification_buffer_multiplier: Decimal,
    pub enrichment_lead_credits: Decimal,
    pub enrichment_deep_profile_credits: Decimal,
    pub enrichment_credit_cost_usd: Decimal,
    pub ads_provider: Option<AdsProviderConfig>,
    pub ads_unit_cost_usd: Decimal,
    pub ads_buffer_multiplier: Decimal,
    pub autodrive_cron: Option<String>,
    pub zip_dataset_url: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field(
                "places_api_key",
                &self.places_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "places_text_search_unit_cost_usd",
                &self.places_text_search_unit_cost_usd,
            )
            .field(
                "places_details_unit_cost_usd",
                &self.places_details_unit_cost_usd,
            )
            .field(
                "anymail_api_key",
                &self.anymail_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "verification_unit_cost_usd",
                &self.verification_unit_cost_usd,
            )
            .field(
                "verification_buffer_multiplier",
                &self.verification_buffer_multiplier,
            )
            .field("enrichment_lead_credits", &self.enrichment_lead_credits)
            .field(
                "enrichment_deep_profile_credits",
                &self.enrichment_deep_profile_credits,
            )
            .field(
                "enrichment_credit_cost_usd",
                &self.enrichment_credit_cost_usd,
            )
            .field("ads_provider", &self.ads_provider)
            .field("ads_unit_cost_usd", &self.ads_unit_cost_usd)
            .field("ads_buffer_multiplier", &self.ads_buffer_multiplier)
            .field("autodrive_cron", &self.autodrive_cron)
            .field("zip_dataset_url", &self.zip_dataset_url)
            .finish()
    }
}
