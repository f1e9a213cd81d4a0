//! Shared fixtures for the pipeline integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use leadpipe_core::{
    AdsProviderConfig, AppConfig, CollectionToggles, EmailSource, EmailStatus, Environment,
    GeoMode, GeoParams, JobPlan, LeadCandidate,
};
use leadpipe_db::NewContact;
use leadpipe_pipeline::{JobView, PipelineContext};
use leadpipe_providers::{AdsLibraryClient, EmailVerifierClient, PlacesClient, ZipDirectory};
use rust_decimal::Decimal;
use sqlx::PgPool;

pub fn test_config() -> AppConfig {
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

/// A context with no provider clients.
pub fn bare_context(pool: &PgPool) -> PipelineContext {
    PipelineContext::from_config(pool.clone(), test_config()).expect("context")
}

pub fn places_context(pool: &PgPool, base_url: &str) -> PipelineContext {
    bare_context(pool).with_places(
        PlacesClient::with_base_url("test-key", 5, "leadpipe-test", base_url).expect("places"),
    )
}

pub fn verifier_context(pool: &PgPool, base_url: &str) -> PipelineContext {
    bare_context(pool).with_verifier(
        EmailVerifierClient::with_base_url("secret", 5, "leadpipe-test", base_url)
            .expect("verifier"),
    )
}

pub fn ads_context(pool: &PgPool, ads_url: &str) -> PipelineContext {
    let config = AdsProviderConfig::CustomHttp {
        url: ads_url.to_string(),
        api_key: None,
    };
    bare_context(pool)
        .with_ads(AdsLibraryClient::new(&config, 5, "leadpipe-test").expect("ads client"))
}

/// A context whose ZIP dataset is served at `{base_url}/zips.json`.
pub fn zips_context(pool: &PgPool, base_url: &str) -> PipelineContext {
    bare_context(pool).with_zips(
        ZipDirectory::new(&format!("{base_url}/zips.json"), 5, "leadpipe-test")
            .expect("zip directory"),
    )
}

pub fn zip_plan(zips: &[&str], keywords: &[&str], target: u32) -> JobPlan {
    JobPlan {
        business_type: "law firm".to_string(),
        keywords: keywords.iter().map(ToString::to_string).collect(),
        geo_mode: GeoMode::ZipSweep,
        geo_params: GeoParams {
            zips: zips.iter().map(ToString::to_string).collect(),
            ..GeoParams::default()
        },
        target_firm_count: target,
        max_searches: 100,
        toggles: CollectionToggles {
            crawl_websites: false,
            deep_crawl: false,
            allow_reinclude: false,
        },
    }
}

pub async fn create_job(pool: &PgPool, plan: JobPlan) -> JobView {
    leadpipe_pipeline::create_job(pool, plan)
        .await
        .expect("create_job")
}

pub async fn internal_id(pool: &PgPool, job: &JobView) -> i64 {
    leadpipe_db::get_job_by_public_id(pool, job.id)
        .await
        .expect("job row")
        .id
}

pub fn candidate(name: &str, place_id: &str, website: Option<&str>) -> LeadCandidate {
    LeadCandidate {
        name: name.to_string(),
        address: Some(format!("{place_id} Main St, Durham, NC")),
        city: Some("Durham".to_string()),
        state: Some("NC".to_string()),
        zip: Some("27701".to_string()),
        phone: None,
        website: website.map(str::to_string),
        external_place_id: Some(place_id.to_string()),
        maps_url: None,
        source_query: "estate attorney in 27701".to_string(),
        source_geo_label: "zip:27701".to_string(),
    }
}

/// Stores a lead with one contact and attributes it to `job_id` with that
/// contact as primary. Returns `(lead_id, contact_id)`.
pub async fn seed_lead(
    pool: &PgPool,
    job_id: i64,
    lead: &LeadCandidate,
    contact_name: &str,
    title: Option<&str>,
    email: Option<&str>,
) -> (i64, i64) {
    let lead_id = leadpipe_db::upsert_lead(pool, None, lead, &lead.identity_hash())
        .await
        .expect("upsert_lead");
    let (first, last) = leadpipe_core::split_full_name(contact_name);
    let contacts = leadpipe_db::insert_contacts(
        pool,
        lead_id,
        &[NewContact {
            full_name: contact_name,
            first_name: first.as_deref(),
            last_name: last.as_deref(),
            title,
            email,
            email_status: if email.is_some() {
                EmailStatus::Unverified
            } else {
                EmailStatus::None
            },
            email_source: email.map(|_| EmailSource::FoundOnSite),
        }],
    )
    .await
    .expect("insert_contacts");
    let contact_id = contacts[0].id;
    leadpipe_db::upsert_job_result(pool, job_id, lead_id, Some(contact_id))
        .await
        .expect("upsert_job_result");
    (lead_id, contact_id)
}
