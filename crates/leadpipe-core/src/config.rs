use std::str::FromStr;

use rust_decimal::Decimal;

use crate::app_config::{AdsProviderConfig, AppConfig, Environment, DEFAULT_ZIP_DATASET_URL};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it from a
/// plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Blank values count as unset so `.env` templates can leave keys empty.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_money = |var: &str, default: &str| -> Result<Decimal, ConfigError> {
        let value = Decimal::from_str(or_default(var, default).trim())
            .map_err(|e| invalid(var, e.to_string()))?;
        if value.is_sign_negative() {
            return Err(invalid(var, "must not be negative".to_string()));
        }
        Ok(value)
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("LEADPIPE_ENV", "development"))?;
    let bind_addr = parse_addr("LEADPIPE_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("LEADPIPE_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("LEADPIPE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("LEADPIPE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("LEADPIPE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let http_timeout_secs = parse_u64("LEADPIPE_HTTP_TIMEOUT_SECS", "20")?;
    let user_agent = or_default("LEADPIPE_USER_AGENT", "LocalLeadFinderBot/1.0");

    let places_api_key = optional("GOOGLE_PLACES_API_KEY");
    let places_text_search_unit_cost_usd = parse_money("GOOGLE_TEXTSEARCH_UNIT_COST_USD", "0.032")?;
    let places_details_unit_cost_usd = parse_money("GOOGLE_DETAILS_UNIT_COST_USD", "0.017")?;

    let anymail_api_key = optional("ANYMAIL_SEARCH_API_KEY");
    let verification_unit_cost_usd = parse_money("ANYMAIL_UNIT_COST_USD", "0.01")?;
    let verification_buffer_multiplier =
        parse_money("VERIFICATION_COST_BUFFER_MULTIPLIER", "1.15")?;

    let enrichment_lead_credits = parse_money("ENRICHMENT_LEAD_CREDITS", "1")?;
    let enrichment_deep_profile_credits = parse_money("ENRICHMENT_DEEP_PROFILE_CREDITS", "5")?;
    let enrichment_credit_cost_usd = parse_money("ENRICHMENT_CREDIT_COST_USD", "0.05")?;

    let ads_provider = match optional("ADS_LIBRARY_PROVIDER").as_deref() {
        None => None,
        Some("dataforseo") => Some(AdsProviderConfig::DataForSeo {
            login: require("DATAFORSEO_LOGIN")?,
            password: require("DATAFORSEO_PASSWORD")?,
            location_code: parse_u32("DATAFORSEO_LOCATION_CODE", "2840")?,
        }),
        Some("custom_http") => Some(AdsProviderConfig::CustomHttp {
            url: require("ADS_LIBRARY_API_URL")?,
            api_key: optional("ADS_LIBRARY_API_KEY"),
        }),
        Some(other) => {
            return Err(invalid(
                "ADS_LIBRARY_PROVIDER",
                format!("expected 'dataforseo' or 'custom_http', got '{other}'"),
            ))
        }
    };
    let ads_unit_cost_usd = parse_money("ADS_LIBRARY_UNIT_COST_USD", "0.02")?;
    let ads_buffer_multiplier = parse_money("ADS_LIBRARY_COST_BUFFER_MULTIPLIER", "1.1")?;

    let autodrive_cron = optional("LEADPIPE_AUTODRIVE_CRON");
    let zip_dataset_url = or_default("LEADPIPE_ZIP_DATASET_URL", DEFAULT_ZIP_DATASET_URL);

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        http_timeout_secs,
        user_agent,
        places_api_key,
        places_text_search_unit_cost_usd,
        places_details_unit_cost_usd,
        anymail_api_key,
        verification_unit_cost_usd,
        verification_buffer_multiplier,
        enrichment_lead_credits,
        enrichment_deep_profile_credits,
        enrichment_credit_cost_usd,
        ads_provider,
        ads_unit_cost_usd,
        ads_buffer_multiplier,
        autodrive_cron,
        zip_dataset_url,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "LEADPIPE_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
