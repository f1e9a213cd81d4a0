use std::net::SocketAddr;
use std::sync::Arc;

use leadpipe_core::{AppConfig, Environment};
use leadpipe_pipeline::PipelineContext;
use leadpipe_providers::{PlacesClient, ZipDirectory};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::api::AppState;

pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        log_level: "warn".to_string(),
        db_max_connections: 5,
        db_min_connections: 1,
        db_acquire_timeout_secs: 5,
        http_timeout_secs: 5,
        user_agent: "leadpipe-test".to_string(),
        places_api_key: None,
        places_text_search_unit_cost_usd: Decimal::new(32, 3),
        places_details_unit_cost_usd: Decimal::new(17, 3),
        anymail_api_key: None,
        verification_unit_cost_usd: Decimal::new(1, 2),
        verification_buffer_multiplier: Decimal::new(115, 2),
        enrichment_lead_credits: Decimal::ONE,
        enrichment_deep_profile_credits: Decimal::from(5),
        enrichment_credit_cost_usd: Decimal::new(5, 2),
        ads_provider: None,
        ads_unit_cost_usd: Decimal::new(2, 2),
        ads_buffer_multiplier: Decimal::new(11, 1),
        autodrive_cron: None,
        zip_dataset_url: "http://127.0.0.1:9/zips.json".to_string(),
    }
}

/// Pipeline with no provider clients configured.
pub(crate) fn bare_pipeline(pool: &PgPool) -> PipelineContext {
    PipelineContext::from_config(pool.clone(), test_config()).expect("pipeline")
}

/// Pipeline whose directory client points at a mock server.
pub(crate) fn places_pipeline(pool: &PgPool, base_url: &str) -> PipelineContext {
    bare_pipeline(pool).with_places(
        PlacesClient::with_base_url("test-key", 5, "leadpipe-test", base_url).expect("places"),
    )
}

/// Pipeline whose ZIP dataset is served at `{base_url}/zips.json`.
pub(crate) fn zips_pipeline(pool: &PgPool, base_url: &str) -> PipelineContext {
    bare_pipeline(pool).with_zips(
        ZipDirectory::new(&format!("{base_url}/zips.json"), 5, "leadpipe-test")
            .expect("zip directory"),
    )
}

pub(crate) fn app_state(pool: &PgPool, pipeline: PipelineContext) -> AppState {
    AppState {
        pool: pool.clone(),
        pipeline: Arc::new(pipeline),
    }
}

/// A JSON plan for one zip and one keyword.
pub(crate) fn plan_json(target: u32) -> serde_json::Value {
    serde_json::json!({
        "business_type": "law firm",
        "keywords": ["estate attorney"],
        "geo_mode": "zip_sweep",
        "geo_params": { "zips": ["27701"] },
        "target_firm_count": target,
        "toggles": { "crawl_websites": false }
    })
}
