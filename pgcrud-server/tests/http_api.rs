//! Router-level tests
//!
//! The default tests point the engine at a port nothing listens on, so they
//! exercise the not-ready and unreachable paths without a database. The
//! end-to-end scenario needs DB_* set:
//! `cargo test -p pgcrud-server --test http_api -- --ignored`

use std::collections::HashMap;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use pgcrud_server::config::keys;
use pgcrud_server::http::build_router;
use pgcrud_server::{EnvSource, Lifecycle, ReadinessState};

fn unreachable_lifecycle() -> Lifecycle {
    let source = HashMap::from([
        (keys::USER, "app"),
        (keys::PASSWORD, "s3cret"),
        (keys::NAME, "appdb"),
        (keys::HOST, "127.0.0.1"),
        (keys::PORT, "1"),
        (keys::ACQUIRE_TIMEOUT_SECS, "1"),
        (keys::CONNECT_ATTEMPTS, "1"),
    ]);
    Lifecycle::from_source(&source).expect("valid test configuration")
}

/// Ready as far as the state machine knows, but nothing answers on the port.
fn ready_unreachable_lifecycle() -> Lifecycle {
    let lifecycle = unreachable_lifecycle();
    lifecycle
        .readiness()
        .transition(ReadinessState::Ready)
        .expect("not_ready -> ready");
    lifecycle
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_raw(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn ready_during_startup_is_503() {
    let app = build_router(unreachable_lifecycle(), false);

    let (status, body) = send(&app, get("/ready")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body,
        json!({"status": "not_ready", "state": "not_ready", "reason": "startup in progress"})
    );
}

#[tokio::test]
async fn crud_before_ready_is_503_and_takes_no_session() {
    let lifecycle = unreachable_lifecycle();
    let app = build_router(lifecycle.clone(), false);

    for request in [
        post_json("/users/", json!({"email": "a@x.com", "name": "A"})),
        post_json("/users", json!({"email": "a@x.com", "name": "A"})),
        get("/users/"),
        get("/users/1"),
        get("/items/"),
        post_json("/users/1/items/", json!({"title": "Lamp"})),
    ] {
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "not_ready");
    }

    assert_eq!(lifecycle.sessions().acquired(), 0);
}

#[tokio::test]
async fn malformed_user_id_is_400() {
    let app = build_router(unreachable_lifecycle(), false);

    for uri in ["/users/abc", "/users/0", "/users/-3"] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["message"], "id: must be a positive integer");
    }
}

#[tokio::test]
async fn undecodable_body_is_400_json_before_any_checkout() {
    let lifecycle = ready_unreachable_lifecycle();
    let app = build_router(lifecycle.clone(), false);

    for request in [
        post_raw("/users/", "{not json"),
        post_raw("/users/", r#"{"email": "q@x.com"}"#),
        post_raw("/users/1/items/", r#"{"description": "no title"}"#),
    ] {
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert!(body["message"].as_str().unwrap().starts_with("request body:"));
    }

    assert_eq!(lifecycle.sessions().acquired(), 0);
}

#[tokio::test]
async fn missing_field_names_the_field() {
    let app = build_router(ready_unreachable_lifecycle(), false);

    let (status, body) = send(&app, post_raw("/users/", r#"{"email": "q@x.com"}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn invalid_input_is_rejected_without_a_session() {
    let lifecycle = ready_unreachable_lifecycle();
    let app = build_router(lifecycle.clone(), false);

    let (status, body) = send(
        &app,
        post_json("/users/", json!({"email": "not-an-email", "name": "A"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(lifecycle.sessions().acquired(), 0);
}

#[tokio::test]
async fn undecodable_query_is_400_json() {
    let app = build_router(ready_unreachable_lifecycle(), false);

    for uri in ["/users/?limit=abc", "/items/?skip=-1"] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "validation_error");
        assert!(body["message"].as_str().unwrap().starts_with("query string:"));
    }
}

#[tokio::test]
async fn failed_checkout_while_ready_is_503() {
    let lifecycle = ready_unreachable_lifecycle();
    let app = build_router(lifecycle.clone(), false);

    let (status, body) = send(&app, get("/users/")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "not_ready");
    assert_eq!(lifecycle.sessions().outstanding(), 0);
}

#[tokio::test]
async fn health_stays_up_when_database_is_down() {
    let app = build_router(unreachable_lifecycle(), false);

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
    assert_eq!(body["service"], "running");
}

#[tokio::test]
async fn exhausted_startup_reports_failed() {
    let lifecycle = unreachable_lifecycle();
    let app = build_router(lifecycle.clone(), false);

    assert_eq!(lifecycle.startup().await, ReadinessState::Failed);

    let (status, body) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["state"], "failed");
}

#[tokio::test]
async fn root_answers() {
    let app = build_router(unreachable_lifecycle(), false);
    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "pgcrud with PostgreSQL");
}

#[tokio::test]
#[ignore = "requires database"]
async fn end_to_end_create_and_duplicate_user() {
    let lifecycle = Lifecycle::from_source(&EnvSource).expect("DB_* configuration required");
    let app = build_router(lifecycle.clone(), false);

    assert_eq!(lifecycle.startup().await, ReadinessState::Ready);
    let (status, body) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ready"}));

    let email = format!("e2e-{}-{}@x.com", std::process::id(), nonce());
    let payload = json!({"email": email, "name": "A"});

    let (status, created) = send(&app, post_json("/users/", payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().expect("assigned id");
    assert!(id > 0);

    let (status, body) = send(&app, post_json("/users/", payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("already exists"));

    let (status, fetched) = send(&app, get(&format!("/users/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["email"], created["email"]);

    let (status, item) = send(
        &app,
        post_json(&format!("/users/{}/items/", id), json!({"title": "Lamp"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["owner_id"], id);

    assert_eq!(lifecycle.sessions().outstanding(), 0);
}

fn nonce() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}
