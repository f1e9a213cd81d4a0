use super::*;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::test_support::{app_state, bare_pipeline, places_pipeline, plan_json, zips_pipeline};

fn open_app(state: AppState) -> Router {
    build_app(state, AuthState::disabled(), default_rate_limit_state())
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(body) => builder.body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

async fn create(app: Router, target: u32) -> String {
    let (status, body) = send(app, "POST", "/api/v1/jobs", Some(plan_json(target))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_str().expect("job id").to_string()
}

#[test]
fn normalize_limit_applies_defaults_and_bounds() {
    assert_eq!(normalize_limit(None), 50);
    assert_eq!(normalize_limit(Some(0)), 1);
    assert_eq!(normalize_limit(Some(10_000)), 500);
    assert_eq!(normalize_limit(Some(25)), 25);
}

#[test]
fn error_codes_map_to_statuses() {
    let cases = [
        ("validation_error", StatusCode::BAD_REQUEST),
        ("not_found", StatusCode::NOT_FOUND),
        ("config_error", StatusCode::UNPROCESSABLE_ENTITY),
        ("upstream_error", StatusCode::BAD_GATEWAY),
        ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, expected) in cases {
        let response = ApiError::new("req-1", code, "boom").into_response();
        assert_eq!(response.status(), expected, "{code}");
    }
}

#[test]
fn empty_body_parses_as_default() {
    let params: leadpipe_pipeline::VerifyParams =
        parse_body("req-1", &Bytes::from_static(b"  \n")).expect("default params");
    assert!(params.valid_only);
    assert!(params.stage.spend_cap.is_none());

    let bad = parse_body::<leadpipe_pipeline::VerifyParams>("req-1", &Bytes::from_static(b"{"));
    assert_eq!(bad.expect_err("malformed").error.code, "validation_error");
}

#[test]
fn job_id_must_be_a_uuid() {
    let err = parse_job_id("req-1", "job-7").expect_err("not a uuid");
    assert_eq!(err.error.code, "validation_error");
    assert!(err.error.message.contains("job-7"));
}

#[test]
fn template_id_errors_name_the_template() {
    let err = parse_uuid("req-1", "template", "t-1").expect_err("not a uuid");
    assert_eq!(err.error.message, "template id must be a UUID, got 't-1'");
}

#[sqlx::test(migrations = "../../migrations")]
async fn health_reports_database_ok(pool: sqlx::PgPool) {
    let app = open_app(app_state(&pool, bare_pipeline(&pool)));
    let (status, body) = send(app, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], "ok");
    assert!(body["meta"]["request_id"].is_string());
}

#[sqlx::test(migrations = "../../migrations")]
async fn created_job_is_readable_and_listed(pool: sqlx::PgPool) {
    let app = open_app(app_state(&pool, bare_pipeline(&pool)));
    let id = create(app.clone(), 5).await;

    let (status, body) = send(app.clone(), "GET", &format!("/api/v1/jobs/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "queued");
    assert_eq!(body["data"]["targetFirmCount"], 5);

    let (status, body) = send(app.clone(), "GET", "/api/v1/jobs?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, body) = send(
        app,
        "GET",
        &format!("/api/v1/jobs/{id}/logs?event=job_created"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[sqlx::test(migrations = "../../migrations")]
async fn invalid_plans_are_rejected(pool: sqlx::PgPool) {
    let app = open_app(app_state(&pool, bare_pipeline(&pool)));

    let mut plan = plan_json(5);
    plan["keywords"] = json!(["  "]);
    let (status, body) = send(app.clone(), "POST", "/api/v1/jobs", Some(plan)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, body) = send(app, "POST", "/api/v1/jobs", Some(json!({ "keywords": 3 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn unknown_and_malformed_job_ids(pool: sqlx::PgPool) {
    let app = open_app(app_state(&pool, bare_pipeline(&pool)));

    let uri = format!("/api/v1/jobs/{}", Uuid::new_v4());
    let (status, body) = send(app.clone(), "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, _) = send(app, "GET", "/api/v1/jobs/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancel_marks_job_failed(pool: sqlx::PgPool) {
    let app = open_app(app_state(&pool, bare_pipeline(&pool)));
    let id = create(app.clone(), 5).await;

    let uri = format!("/api/v1/jobs/{id}/cancel");
    let (status, body) = send(app.clone(), "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "failed");
    assert_eq!(body["data"]["failureReason"], "canceled");

    let (status, _) = send(app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[sqlx::test(migrations = "../../migrations")]
async fn collect_without_directory_key_is_a_config_error(pool: sqlx::PgPool) {
    let app = open_app(app_state(&pool, bare_pipeline(&pool)));
    let id = create(app.clone(), 5).await;

    let (status, body) = send(app, "POST", &format!("/api/v1/jobs/{id}/collect"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "config_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn collect_runs_one_batch_until_target(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "results": [{ "place_id": "p1", "name": "Firm p1" }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/details/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "result": {
                "place_id": "p1",
                "name": "Firm p1",
                "formatted_address": "1 Main St, Durham, NC 27701"
            }
        })))
        .mount(&server)
        .await;

    let app = open_app(app_state(&pool, places_pipeline(&pool, &server.uri())));
    let id = create(app.clone(), 1).await;

    let uri = format!("/api/v1/jobs/{id}/collect");
    let (status, body) = send(app.clone(), "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["done"], true);
    assert_eq!(body["data"]["progressCount"], 1);
    assert_eq!(body["data"]["reason"], "target_reached");
    assert_eq!(body["data"]["search"]["query"], "estate attorney in 27701");

    let (_, body) = send(app.clone(), "POST", &uri, None).await;
    assert_eq!(body["data"]["reason"], "already_completed");

    let (status, body) = send(app, "GET", &format!("/api/v1/jobs/{id}/results"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[sqlx::test(migrations = "../../migrations")]
async fn spend_capped_stages_require_a_cap(pool: sqlx::PgPool) {
    let app = open_app(app_state(&pool, bare_pipeline(&pool)));
    let id = create(app.clone(), 5).await;

    let (status, body) = send(app.clone(), "POST", &format!("/api/v1/jobs/{id}/verify"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, body) = send(
        app,
        "POST",
        &format!("/api/v1/jobs/{id}/verify"),
        Some(json!({ "spendCap": "5.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "config_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn estimates_accept_dashed_stage_names(pool: sqlx::PgPool) {
    let app = open_app(app_state(&pool, bare_pipeline(&pool)));
    let id = create(app.clone(), 5).await;

    let (status, body) = send(
        app.clone(),
        "POST",
        &format!("/api/v1/jobs/{id}/estimates/verification"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"].is_object());

    let (status, body) = send(
        app.clone(),
        "POST",
        &format!("/api/v1/jobs/{id}/estimates/ads-scan"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let (status, body) = send(
        app,
        "POST",
        &format!("/api/v1/jobs/{id}/estimates/outreach"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .is_some_and(|m| m.contains("outreach")));
}

#[sqlx::test(migrations = "../../migrations")]
async fn protected_routes_require_a_bearer_token(pool: sqlx::PgPool) {
    let auth = AuthState::from_raw("secret-key", false).expect("auth");
    let app = build_app(
        app_state(&pool, bare_pipeline(&pool)),
        auth,
        default_rate_limit_state(),
    );

    let (status, body) = send(app.clone(), "GET", "/api/v1/jobs", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, _) = send(app.clone(), "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .uri("/api/v1/jobs")
        .header(header::AUTHORIZATION, "Bearer secret-key")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../migrations")]
async fn rate_limit_rejects_excess_requests(pool: sqlx::PgPool) {
    let app = build_app(
        app_state(&pool, bare_pipeline(&pool)),
        AuthState::disabled(),
        RateLimitState::new(1, Duration::from_secs(60)),
    );

    let (status, _) = send(app.clone(), "GET", "/api/v1/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(app, "GET", "/api/v1/jobs", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "rate_limited");
}

async fn mount_zip_dataset() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zips.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "27701": { "state": "NC" },
            "27705": { "state": "NC" },
            "73301": { "state": "TX" }
        })))
        .mount(&server)
        .await;
    server
}

#[sqlx::test(migrations = "../../migrations")]
async fn saved_template_is_listed_and_launches_jobs(pool: sqlx::PgPool) {
    let app = open_app(app_state(&pool, bare_pipeline(&pool)));

    let request = json!({
        "name": "Durham estate",
        "description": "one zip",
        "plan": plan_json(7),
    });
    let (status, body) = send(app.clone(), "POST", "/api/v1/templates", Some(request)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let template_id = body["data"]["id"].as_str().expect("template id").to_string();
    assert_eq!(body["data"]["description"], "one zip");

    let (status, body) = send(app.clone(), "GET", "/api/v1/templates", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], "Durham estate");

    let uri = format!("/api/v1/templates/{template_id}/jobs");
    let (status, body) = send(app.clone(), "POST", &uri, None).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "queued");
    assert_eq!(body["data"]["targetFirmCount"], 7);

    let (status, _) = send(app.clone(), "POST", &uri, None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, body) = send(app, "GET", "/api/v1/jobs", None).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn template_requests_are_validated(pool: sqlx::PgPool) {
    let app = open_app(app_state(&pool, bare_pipeline(&pool)));

    let blank = json!({ "name": "  ", "plan": plan_json(3) });
    let (status, body) = send(app.clone(), "POST", "/api/v1/templates", Some(blank)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let no_plan = json!({ "name": "Missing plan" });
    let (status, _) = send(app.clone(), "POST", "/api/v1/templates", Some(no_plan)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/v1/templates/{}/jobs", Uuid::new_v4());
    let (status, body) = send(app.clone(), "POST", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = send(app, "POST", "/api/v1/templates/nope/jobs", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .is_some_and(|m| m.starts_with("template id")));
}

#[sqlx::test(migrations = "../../migrations")]
async fn state_zips_route_validates_the_code(pool: sqlx::PgPool) {
    let server = mount_zip_dataset().await;
    let app = open_app(app_state(&pool, zips_pipeline(&pool, &server.uri())));

    let (status, body) = send(app.clone(), "GET", "/api/v1/states/nc/zips", None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["state"], "NC");
    assert_eq!(body["data"]["zips"], json!(["27701", "27705"]));

    let (status, body) = send(app, "GET", "/api/v1/states/XX/zips", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn state_only_zip_sweep_is_filled_on_create(pool: sqlx::PgPool) {
    let server = mount_zip_dataset().await;
    let app = open_app(app_state(&pool, zips_pipeline(&pool, &server.uri())));

    let mut plan = plan_json(5);
    plan["geo_params"] = json!({ "state_code": "TX" });
    let (status, body) = send(app, "POST", "/api/v1/jobs", Some(plan)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["plan"]["geo_params"]["zips"], json!(["73301"]));
}
