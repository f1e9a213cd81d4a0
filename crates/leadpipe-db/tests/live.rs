//! Live integration tests for leadpipe-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database. The
//! `migrations` path is relative to `crates/leadpipe-db/`.

use chrono::NaiveDate;
use leadpipe_core::{EmailSource, EmailStatus, LeadCandidate, Stage, StageStatus};
use leadpipe_db::{
    append_run_log, begin_stage, cancel_job, count_job_results, count_pending_ads_scan,
    count_pending_enrichment, count_pending_verification, create_job, fill_missing_phone,
    find_existing_lead_id, get_contact, get_job, get_job_template_by_public_id, get_lead,
    insert_contacts, insert_job_template, insert_signals, list_active_job_templates,
    list_job_results, list_pending_ads_scan, list_pending_enrichment, list_pending_verification,
    list_run_logs, mark_job_running, record_contact_verification, record_stage_estimate,
    save_collect_progress, save_stage_progress, set_primary_contact_in_scope, try_lock_stage,
    upsert_ads_observation, upsert_email_verification, upsert_job_result, upsert_lead,
    CollectProgress, ContactVerificationUpdate, DbError, NewAdsObservation, NewContact,
    NewEmailVerification, NewJob, NewSignal, WorkScope,
};
use rust_decimal::Decimal;
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_test_job(pool: &sqlx::PgPool) -> i64 {
    let plan = json!({ "business_type": "law firm", "keywords": ["estate attorney"] });
    create_job(
        pool,
        &NewJob {
            plan: &plan,
            target_firm_count: 10,
            max_searches: 5,
            allow_reinclude: false,
        },
    )
    .await
    .expect("create_job failed")
    .id
}

fn candidate(name: &str, place_id: Option<&str>) -> LeadCandidate {
    LeadCandidate {
        name: name.to_string(),
        address: Some("1 Main St, Durham, NC".to_string()),
        city: Some("Durham".to_string()),
        state: Some("NC".to_string()),
        zip: Some("27701".to_string()),
        phone: Some("(919) 555-0100".to_string()),
        website: Some("https://example-law.com".to_string()),
        external_place_id: place_id.map(str::to_string),
        maps_url: None,
        source_query: "estate attorney in Durham, NC".to_string(),
        source_geo_label: "radius:Durham, NC".to_string(),
    }
}

async fn insert_test_lead(pool: &sqlx::PgPool, name: &str, place_id: &str) -> i64 {
    let lead = candidate(name, Some(place_id));
    upsert_lead(pool, None, &lead, &lead.identity_hash())
        .await
        .expect("upsert_lead failed")
}

async fn insert_primary_contact(pool: &sqlx::PgPool, job_id: i64, lead_id: i64) -> i64 {
    let inserted = insert_contacts(
        pool,
        lead_id,
        &[NewContact {
            full_name: "Jane Doe",
            first_name: Some("Jane"),
            last_name: Some("Doe"),
            title: Some("Founder"),
            email: None,
            email_status: EmailStatus::None,
            email_source: None,
        }],
    )
    .await
    .expect("insert_contacts failed");
    let contact_id = inserted[0].id;
    upsert_job_result(pool, job_id, lead_id, Some(contact_id))
        .await
        .expect("upsert_job_result failed");
    contact_id
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn job_moves_from_queued_to_completed(pool: sqlx::PgPool) {
    let id = insert_test_job(&pool).await;
    let job = get_job(&pool, id).await.expect("get_job failed");
    assert_eq!(job.status, "queued");
    assert!(job.started_at.is_none());

    assert!(mark_job_running(&pool, id).await.expect("mark failed"));
    let progress = CollectProgress {
        segment_offset: 0,
        keyword_offset: 1,
        progress_count: 3,
        searches_executed: 1,
        completed: true,
    };
    assert!(save_collect_progress(&pool, id, &progress)
        .await
        .expect("save failed"));

    let job = get_job(&pool, id).await.expect("get_job failed");
    assert_eq!(job.status, "completed");
    assert_eq!(job.keyword_offset, 1);
    assert_eq!(job.progress_count, 3);
    assert!(job.started_at.is_some());
    assert!(job.finished_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancel_wins_over_late_collect_progress(pool: sqlx::PgPool) {
    let id = insert_test_job(&pool).await;
    mark_job_running(&pool, id).await.expect("mark failed");

    let canceled = cancel_job(&pool, id)
        .await
        .expect("cancel failed")
        .expect("job should have been cancelable");
    assert_eq!(canceled.status, "failed");
    assert_eq!(canceled.failure_reason.as_deref(), Some("canceled"));
    assert_eq!(canceled.error_message.as_deref(), Some("Canceled by user"));

    let progress = CollectProgress {
        segment_offset: 1,
        keyword_offset: 0,
        progress_count: 9,
        searches_executed: 2,
        completed: false,
    };
    let applied = save_collect_progress(&pool, id, &progress)
        .await
        .expect("save failed");
    assert!(!applied);

    let job = get_job(&pool, id).await.expect("get_job failed");
    assert_eq!(job.status, "failed");
    assert_eq!(job.progress_count, 0);

    assert!(cancel_job(&pool, id).await.expect("cancel failed").is_none());
    assert!(!mark_job_running(&pool, id).await.expect("mark failed"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn stage_spend_state_round_trips(pool: sqlx::PgPool) {
    let id = insert_test_job(&pool).await;

    record_stage_estimate(&pool, id, Stage::Verification, &json!({"estimatedCostUsd": "1.15"}))
        .await
        .expect("estimate failed");
    let job = get_job(&pool, id).await.expect("get_job failed");
    let state = job.stage_state(Stage::Verification).expect("stage state");
    assert_eq!(state.status, "estimated");

    begin_stage(&pool, id, Stage::Verification, Decimal::new(500, 2))
        .await
        .expect("begin failed");
    save_stage_progress(
        &pool,
        id,
        Stage::Verification,
        Decimal::new(3, 2),
        StageStatus::Completed,
    )
    .await
    .expect("save failed");

    // An estimate after completion keeps the completed status.
    record_stage_estimate(&pool, id, Stage::Verification, &json!({}))
        .await
        .expect("estimate failed");

    let job = get_job(&pool, id).await.expect("get_job failed");
    let state = job.stage_state(Stage::Verification).expect("stage state");
    assert_eq!(state.status, "completed");
    assert_eq!(state.spend_actual, Decimal::new(3, 2));
    assert_eq!(state.spend_cap, Some(Decimal::new(5, 0)));
    assert!(job.stage_state(Stage::Collect).is_none());

    let err = begin_stage(&pool, id, Stage::Collect, Decimal::ONE)
        .await
        .expect_err("collect has no spend columns");
    assert!(matches!(err, DbError::NotSpendCapped(Stage::Collect)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn run_log_is_append_only_and_filterable(pool: sqlx::PgPool) {
    let id = insert_test_job(&pool).await;
    append_run_log(&pool, id, "collect_batch", &json!({"found": 3}))
        .await
        .expect("append failed");
    append_run_log(&pool, id, "dedupe_skip", &json!({"name": "Acme"}))
        .await
        .expect("append failed");

    let all = list_run_logs(&pool, id, None, 50).await.expect("list failed");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].event, "collect_batch");

    let skips = list_run_logs(&pool, id, Some("dedupe_skip"), 50)
        .await
        .expect("list failed");
    assert_eq!(skips.len(), 1);
    assert_eq!(skips[0].payload["name"], "Acme");
}

// ---------------------------------------------------------------------------
// Locks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn stage_lock_excludes_second_holder_until_released(pool: sqlx::PgPool) {
    let first = try_lock_stage(&pool, 7, Stage::Collect)
        .await
        .expect("lock query failed")
        .expect("first lock should succeed");

    let second = try_lock_stage(&pool, 7, Stage::Collect)
        .await
        .expect("lock query failed");
    assert!(second.is_none(), "same job and stage must be exclusive");

    let other_stage = try_lock_stage(&pool, 7, Stage::Enrichment)
        .await
        .expect("lock query failed");
    assert!(other_stage.is_some(), "other stages are independent");

    first.release().await.expect("release failed");
    let again = try_lock_stage(&pool, 7, Stage::Collect)
        .await
        .expect("lock query failed");
    assert!(again.is_some());
}

// ---------------------------------------------------------------------------
// Leads, contacts, job results
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn existing_lead_found_by_place_id_or_identity_hash(pool: sqlx::PgPool) {
    let lead = candidate("Acme Law", Some("place-1"));
    let hash = lead.identity_hash();
    let id = upsert_lead(&pool, None, &lead, &hash)
        .await
        .expect("upsert failed");

    let by_place = find_existing_lead_id(&pool, Some("place-1"), "nope")
        .await
        .expect("find failed");
    assert_eq!(by_place, Some(id));

    let by_hash = find_existing_lead_id(&pool, None, &hash)
        .await
        .expect("find failed");
    assert_eq!(by_hash, Some(id));

    let missing = find_existing_lead_id(&pool, Some("place-2"), "nope")
        .await
        .expect("find failed");
    assert_eq!(missing, None);

    // Updating in place keeps the identity and leaves absent fields alone.
    let mut refreshed = candidate("Acme Law PLLC", None);
    refreshed.phone = None;
    let same = upsert_lead(&pool, Some(id), &refreshed, &hash)
        .await
        .expect("update failed");
    assert_eq!(same, id);
    let row = get_lead(&pool, id).await.expect("get_lead failed");
    assert_eq!(row.name, "Acme Law PLLC");
    assert_eq!(row.phone.as_deref(), Some("(919) 555-0100"));
    assert_eq!(row.external_place_id.as_deref(), Some("place-1"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn contacts_are_unique_per_lead_and_name(pool: sqlx::PgPool) {
    let lead_id = insert_test_lead(&pool, "Acme Law", "place-1").await;
    let jane = NewContact {
        full_name: "Jane Doe",
        first_name: Some("Jane"),
        last_name: Some("Doe"),
        title: Some("Partner"),
        email: Some("jane@example-law.com"),
        email_status: EmailStatus::Unverified,
        email_source: Some(EmailSource::FoundOnSite),
    };

    let first = insert_contacts(&pool, lead_id, std::slice::from_ref(&jane))
        .await
        .expect("insert failed");
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].email_status, "unverified");
    assert_eq!(first[0].email_source.as_deref(), Some("found_on_site"));

    let again = insert_contacts(&pool, lead_id, &[jane])
        .await
        .expect("insert failed");
    assert!(again.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn job_result_upsert_reports_new_once(pool: sqlx::PgPool) {
    let job_id = insert_test_job(&pool).await;
    let lead_id = insert_test_lead(&pool, "Acme Law", "place-1").await;

    assert!(upsert_job_result(&pool, job_id, lead_id, None)
        .await
        .expect("upsert failed"));
    assert!(!upsert_job_result(&pool, job_id, lead_id, None)
        .await
        .expect("upsert failed"));
    assert_eq!(count_job_results(&pool, job_id).await.expect("count"), 1);

    let results = list_job_results(&pool, job_id, 50, 0)
        .await
        .expect("list failed");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "Acme Law");
    assert!(results[0].contact_full_name.is_none());
}

// ---------------------------------------------------------------------------
// Pending work selection
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn verification_pending_excludes_attempted_contacts(pool: sqlx::PgPool) {
    let job_id = insert_test_job(&pool).await;
    let lead_id = insert_test_lead(&pool, "Acme Law", "place-1").await;
    let contact_id = insert_primary_contact(&pool, job_id, lead_id).await;
    let scope = WorkScope {
        job_ids: &[job_id],
        lead_ids: None,
    };

    let pending = list_pending_verification(&pool, scope, 20)
        .await
        .expect("list failed");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].contact_id, contact_id);
    assert_eq!(pending[0].website.as_deref(), Some("https://example-law.com"));

    let response = json!({"status": "valid"});
    upsert_email_verification(
        &pool,
        &NewEmailVerification {
            contact_id,
            email: "jane.doe@example-law.com",
            provider: "anymailsearch",
            status: EmailStatus::Valid,
            confidence: Some(0.97),
            provider_response: &response,
        },
    )
    .await
    .expect("verification upsert failed");
    record_contact_verification(
        &pool,
        contact_id,
        &ContactVerificationUpdate {
            email: Some("jane.doe@example-law.com"),
            email_status: EmailStatus::Valid,
            email_source: Some(EmailSource::GeneratedPattern),
        },
    )
    .await
    .expect("contact update failed");

    let contact = get_contact(&pool, contact_id).await.expect("get failed");
    assert_eq!(contact.email_status, "valid");
    assert!(contact.email_verified_at.is_some());
    assert_eq!(
        count_pending_verification(&pool, scope).await.expect("count"),
        0
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn selected_leads_narrow_pending_work(pool: sqlx::PgPool) {
    let job_id = insert_test_job(&pool).await;
    let first = insert_test_lead(&pool, "Acme Law", "place-1").await;
    let second = insert_test_lead(&pool, "Beta Law", "place-2").await;
    upsert_job_result(&pool, job_id, first, None).await.expect("upsert");
    upsert_job_result(&pool, job_id, second, None).await.expect("upsert");

    let all = WorkScope {
        job_ids: &[job_id],
        lead_ids: None,
    };
    let selected_ids = [second];
    let selected = WorkScope {
        job_ids: &[job_id],
        lead_ids: Some(&selected_ids),
    };
    let marker = "segment_in_business_20_plus";

    assert_eq!(count_pending_enrichment(&pool, all, marker).await.expect("count"), 2);
    let rows = list_pending_enrichment(&pool, selected, marker, 20)
        .await
        .expect("list failed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].lead_id, second);

    insert_signals(
        &pool,
        &[NewSignal {
            lead_id: second,
            contact_id: None,
            signal_type: marker,
            signal_value: json!({"value": false, "confidence": 0.42}),
            evidence_url: None,
        }],
    )
    .await
    .expect("insert signals failed");
    assert_eq!(count_pending_enrichment(&pool, all, marker).await.expect("count"), 1);
    assert_eq!(
        count_pending_enrichment(&pool, selected, marker)
            .await
            .expect("count"),
        0
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn ads_scan_pending_is_per_window(pool: sqlx::PgPool) {
    let job_id = insert_test_job(&pool).await;
    let lead_id = insert_test_lead(&pool, "Acme Law", "place-1").await;
    upsert_job_result(&pool, job_id, lead_id, None).await.expect("upsert");
    let scope = WorkScope {
        job_ids: &[job_id],
        lead_ids: None,
    };
    let start = NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date");
    let end = NaiveDate::from_ymd_opt(2026, 1, 31).expect("valid date");
    let response = json!({});

    let observation = NewAdsObservation {
        lead_id,
        job_id,
        provider: "custom_http",
        period_start: start,
        period_end: end,
        advertiser_name: Some("Acme Law"),
        ads_count_active: 2,
        ads_count_in_period: 3,
        min_ads: 1,
        threshold_match: true,
        first_seen_at: None,
        last_seen_at: None,
        evidence_url: None,
        provider_response: &response,
    };
    assert!(upsert_ads_observation(&pool, &observation).await.expect("upsert"));
    assert!(!upsert_ads_observation(&pool, &observation).await.expect("upsert"));

    let same_window = count_pending_ads_scan(&pool, scope, "custom_http", (start, end))
        .await
        .expect("count");
    assert_eq!(same_window, 0);

    let later = NaiveDate::from_ymd_opt(2026, 2, 28).expect("valid date");
    let other_window = list_pending_ads_scan(&pool, scope, "custom_http", (start, later), 20)
        .await
        .expect("list");
    assert_eq!(other_window.len(), 1);

    let other_provider = count_pending_ads_scan(&pool, scope, "dataforseo", (start, end))
        .await
        .expect("count");
    assert_eq!(other_provider, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn primary_contact_set_across_scope(pool: sqlx::PgPool) {
    let job_a = insert_test_job(&pool).await;
    let job_b = insert_test_job(&pool).await;
    let lead_id = insert_test_lead(&pool, "Acme Law", "place-1").await;
    upsert_job_result(&pool, job_a, lead_id, None).await.expect("upsert");
    upsert_job_result(&pool, job_b, lead_id, None).await.expect("upsert");
    let contact_id = insert_primary_contact(&pool, job_a, lead_id).await;

    let updated = set_primary_contact_in_scope(&pool, &[job_a, job_b], lead_id, contact_id)
        .await
        .expect("update failed");
    assert_eq!(updated, 2);

    let rows = list_job_results(&pool, job_b, 10, 0).await.expect("list");
    assert_eq!(rows[0].primary_contact_id, Some(contact_id));
    assert_eq!(rows[0].contact_full_name.as_deref(), Some("Jane Doe"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn crawled_phone_only_fills_a_blank(pool: sqlx::PgPool) {
    let mut lead = candidate("Acme Law", Some("place-1"));
    lead.phone = Some("  ".to_string());
    let lead_id = upsert_lead(&pool, None, &lead, &lead.identity_hash())
        .await
        .expect("upsert_lead failed");

    assert!(fill_missing_phone(&pool, lead_id, "(919) 555-0142")
        .await
        .expect("fill"));
    assert!(!fill_missing_phone(&pool, lead_id, "(919) 555-0199")
        .await
        .expect("fill"));

    let lead = get_lead(&pool, lead_id).await.expect("get_lead");
    assert_eq!(lead.phone.as_deref(), Some("(919) 555-0142"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn templates_list_active_newest_first(pool: sqlx::PgPool) {
    let plan = json!({ "business_type": "law firm", "keywords": ["estate attorney"] });
    let first = insert_job_template(&pool, "Durham sweep", None, &plan)
        .await
        .expect("insert");
    let second = insert_job_template(&pool, "Raleigh sweep", Some("weekly"), &plan)
        .await
        .expect("insert");
    let retired = insert_job_template(&pool, "Old sweep", None, &plan)
        .await
        .expect("insert");
    sqlx::query("UPDATE job_templates SET is_active = FALSE WHERE id = $1")
        .bind(retired.id)
        .execute(&pool)
        .await
        .expect("retire");

    let rows = list_active_job_templates(&pool, 10).await.expect("list");
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Raleigh sweep", "Durham sweep"]);
    assert_eq!(rows[0].description.as_deref(), Some("weekly"));
    assert_eq!(rows[1].plan, plan);

    let found = get_job_template_by_public_id(&pool, first.public_id)
        .await
        .expect("get");
    assert_eq!(found.id, first.id);
    assert!(second.is_active);

    let err = get_job_template_by_public_id(&pool, retired.public_id)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn blank_template_name_is_rejected(pool: sqlx::PgPool) {
    let err = insert_job_template(&pool, "   ", None, &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Sqlx(_)));
}
