//! End-to-end tests of the HTTP surface through `tower::ServiceExt::oneshot`.

use crate::mock_infrastructure::{
    create_test_service, test_config, StakeTable, TestValidatorKey, ValidatorMockBuilder,
    ADMIN_KEY, ROOT_KEY,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use gateway_core::{auth::registration::now_nanos, config::AppConfig, metrics};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use serial_test::serial;
use server::{create_app, AppState};
use tower::ServiceExt;

async fn create_test_app(config: &AppConfig, trust: StakeTable) -> Router {
    let service = create_test_service(config, trust).await;
    create_app(AppState { service, metrics: metrics::install_recorder() }, config)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, headers: &[(&str, &str)], body: &Value) -> Request<Body> {
    let mut builder =
        Request::builder().method("POST").uri(uri).header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn register_request(key: &TestValidatorKey, nonce_ns: i128, ip: &str, port: u16) -> Request<Body> {
    let (message, signature) = key.sign_registration("session-token", nonce_ns);
    post_json(
        "/register",
        &[
            ("ss58_address", key.identity.as_str()),
            ("message", message.as_str()),
            ("signature", signature.as_str()),
            ("x-real-ip", ip),
        ],
        &json!({ "port": port }),
    )
}

fn organic_body(context: &str) -> Value {
    json!({ "context": context, "tier": "universal", "target_model": "m" })
}

#[tokio::test]
#[serial]
async fn test_register_then_organic_round_trip() {
    let key = TestValidatorKey::new(11);
    let mut validator = ValidatorMockBuilder::new().await;
    validator.mock_compress_any("compressed");
    let (host, port) = validator.host_port();

    let config = test_config();
    let app =
        create_test_app(&config, StakeTable::new(&[(key.identity.as_str(), 5000.0)])).await;

    let (status, body) = send(&app, register_request(&key, now_nanos(), &host, port)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");

    let (status, health) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["live_backends"], 1);

    let (status, body) = send(
        &app,
        post_json("/api/organic", &[("user-api-key", ROOT_KEY)], &organic_body("hello")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["compressed_context"], "compressed");
}

#[tokio::test]
#[serial]
async fn test_register_rejects_stale_nonce() {
    let key = TestValidatorKey::new(12);
    let config = test_config();
    let app =
        create_test_app(&config, StakeTable::new(&[(key.identity.as_str(), 5000.0)])).await;

    let stale = now_nanos() - 60 * 1_000_000_000;
    let (status, body) = send(&app, register_request(&key, stale, "10.0.0.1", 8091)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].as_str().unwrap().contains("too old"), "{body}");
}

#[tokio::test]
#[serial]
async fn test_register_rejects_bad_signature() {
    let key = TestValidatorKey::new(13);
    let impostor = TestValidatorKey::new(14);
    let config = test_config();
    let app = create_test_app(&config, StakeTable::default()).await;

    let (message, signature) = impostor.fresh_registration("session-token");
    let request = post_json(
        "/register",
        &[
            ("ss58_address", key.identity.as_str()),
            ("message", message.as_str()),
            ("signature", signature.as_str()),
            ("x-real-ip", "10.0.0.1"),
        ],
        &json!({ "port": 8091 }),
    );

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid token");
}

#[tokio::test]
#[serial]
async fn test_register_outside_allowlist() {
    let key = TestValidatorKey::new(15);
    let mut config = test_config();
    config.pool.allowlist = vec!["someone-else".to_string()];
    let app = create_test_app(&config, StakeTable::default()).await;

    let (status, _) = send(&app, register_request(&key, now_nanos(), "10.0.0.1", 8091)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn test_user_register_flow() {
    let config = test_config();
    let app = create_test_app(&config, StakeTable::default()).await;
    let body = json!({ "api_key": "caller-1" });

    let (status, _) =
        send(&app, post_json("/api/user-register", &[("admin-api-key", "wrong")], &body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, missing) =
        send(&app, post_json("/api/user-register", &[("admin-api-key", ADMIN_KEY)], &json!({})))
            .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(missing["detail"], "API key required");

    let (status, created) =
        send(&app, post_json("/api/user-register", &[("admin-api-key", ADMIN_KEY)], &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], "success");

    let (status, duplicate) =
        send(&app, post_json("/api/user-register", &[("admin_api_key", ADMIN_KEY)], &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate["detail"], "API key already exists");
}

#[tokio::test]
#[serial]
async fn test_organic_caller_checks() {
    let config = test_config();
    let app = create_test_app(&config, StakeTable::default()).await;

    let (status, body) = send(
        &app,
        post_json("/api/organic", &[("user-api-key", "nobody")], &organic_body("hello")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Unauthorized");

    let (status, _) =
        send(&app, post_json("/api/organic", &[], &organic_body("hello"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    send(
        &app,
        post_json(
            "/api/user-register",
            &[("admin-api-key", ADMIN_KEY)],
            &json!({ "api_key": "caller-1" }),
        ),
    )
    .await;

    // admitted, but nothing is registered to serve it
    let (status, _) = send(
        &app,
        post_json("/api/organic", &[("user-api-key", "caller-1")], &organic_body("hello")),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = send(
        &app,
        post_json("/api/organic", &[("user-api-key", "caller-1")], &organic_body("hello")),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
#[serial]
async fn test_organic_context_length_boundary() {
    let key = TestValidatorKey::new(16);
    let mut validator = ValidatorMockBuilder::new().await;
    validator.mock_compress_any("compressed");
    let (host, port) = validator.host_port();

    let config = test_config();
    let app =
        create_test_app(&config, StakeTable::new(&[(key.identity.as_str(), 5000.0)])).await;
    send(&app, register_request(&key, now_nanos(), &host, port)).await;

    let (status, _) = send(
        &app,
        post_json(
            "/api/organic",
            &[("user-api-key", ROOT_KEY)],
            &organic_body(&"a".repeat(25_000)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post_json(
            "/api/organic",
            &[("user-api-key", ROOT_KEY)],
            &organic_body(&"a".repeat(24_999)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[serial]
async fn test_compress_messages_endpoint() {
    let key = TestValidatorKey::new(17);
    let mut validator = ValidatorMockBuilder::new().await;
    validator.mock_compress_any("short");
    let (host, port) = validator.host_port();

    let config = test_config();
    let app =
        create_test_app(&config, StakeTable::new(&[(key.identity.as_str(), 5000.0)])).await;
    send(&app, register_request(&key, now_nanos(), &host, port)).await;

    let (status, body) = send(
        &app,
        post_json("/api/v1/compress/messages", &[("user-api-key", ROOT_KEY)], &json!({
            "messages": []
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "No messages provided");

    let (status, body) = send(
        &app,
        post_json("/api/v1/compress/messages", &[("user-api-key", ROOT_KEY)], &json!({
            "messages": [
                {"role": "system", "content": "rules"},
                {"role": "user", "content": "a long question"}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");
    assert_eq!(
        body["messages"],
        json!([
            {"role": "system", "content": "rules"},
            {"role": "user", "content": "short"}
        ])
    );
}

#[tokio::test]
#[serial]
async fn test_compress_text_endpoint() {
    let key = TestValidatorKey::new(18);
    let mut validator = ValidatorMockBuilder::new().await;
    validator.mock_compress_any("tiny");
    let (host, port) = validator.host_port();

    let config = test_config();
    let app =
        create_test_app(&config, StakeTable::new(&[(key.identity.as_str(), 5000.0)])).await;
    send(&app, register_request(&key, now_nanos(), &host, port)).await;

    let (status, body) = send(
        &app,
        post_json("/api/v1/compress/text", &[("user-api-key", ROOT_KEY)], &json!({
            "text": "a very long text"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, json!({ "compressed_text": "tiny", "compressed": true }));
}

#[tokio::test]
#[serial]
async fn test_uptime_with_no_samples() {
    let config = test_config();
    let app = create_test_app(&config, StakeTable::default()).await;

    let (status, body) = send(&app, get("/api/organic/uptime")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_checks"], 0);
    assert_eq!(body["uptime_percentage"], 0.0);
    assert_eq!(body["recent_status"], json!([]));
    assert_eq!(body["last_failed_timestamp"], Value::Null);
}

#[tokio::test]
#[serial]
async fn test_responses_carry_request_id() {
    let config = test_config();
    let app = create_test_app(&config, StakeTable::default()).await;

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));

    let response = app
        .oneshot(post_json("/api/organic", &[("x-request-id", "abc-123")], &organic_body("x")))
        .await
        .unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "abc-123");
}

#[tokio::test]
#[serial]
async fn test_metrics_endpoint() {
    let config = test_config();
    let app = create_test_app(&config, StakeTable::default()).await;

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"].to_str().unwrap().starts_with("text/plain"));
}
