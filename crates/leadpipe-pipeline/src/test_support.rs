use std::net::SocketAddr;

use leadpipe_core::{AppConfig, CollectionToggles, Environment, GeoMode, GeoParams, JobPlan};
use leadpipe_db::JobRow;
use leadpipe_providers::PlacesClient;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::context::PipelineContext;

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

pub(crate) fn bare_context(pool: &PgPool) -> PipelineContext {
    PipelineContext::from_config(pool.clone(), test_config()).expect("context")
}

pub(crate) fn places_client(base_url: &str) -> PlacesClient {
    PlacesClient::with_base_url("test-key", 5, "leadpipe-test", base_url).expect("places")
}

/// One keyword swept over `zips`, without crawling.
pub(crate) fn zip_plan(zips: &[&str]) -> JobPlan {
    JobPlan {
        business_type: "law firm".to_string(),
        keywords: vec!["estate attorney".to_string()],
        geo_mode: GeoMode::ZipSweep,
        geo_params: GeoParams {
            zips: zips.iter().map(ToString::to_string).collect(),
            ..GeoParams::default()
        },
        target_firm_count: 50,
        max_searches: 100,
        toggles: CollectionToggles {
            crawl_websites: false,
            ..CollectionToggles::default()
        },
    }
}

/// Creates a job and returns its stored row.
pub(crate) async fn job_row(pool: &PgPool, plan: JobPlan) -> JobRow {
    let job = crate::create_job(pool, plan).await.expect("create job");
    leadpipe_db::get_job_by_public_id(pool, job.id)
        .await
        .expect("job row")
}
