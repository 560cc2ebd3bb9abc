//! Integration tests for the Admin REST API handlers.
//!
//! Uses `tower::ServiceExt::oneshot` to call the router without binding a
//! real TCP port — every test gets a fresh in-memory store.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use chrono::Utc;
use gatehouse_admin::{build_admin_router, AdminState};
use gatehouse_core::Store;
use gatehouse_store::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> axum::Router {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    build_admin_router(Arc::new(AdminState {
        store,
        auth_token: Some("secret".to_string()),
    }))
}

fn authed(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", "token secret")
        .header("content-type", "application/json")
        .body(body)
        .unwrap()
}

async fn body_json(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

#[tokio::test]
async fn list_is_empty_object_initially() {
    let resp = app()
        .oneshot(authed("GET", "/api/routes", Body::empty()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let value = body_json(resp).await;
    assert_eq!(value, json!({}));
}

#[tokio::test]
async fn upsert_then_get_round_trips() {
    let app = app();
    let create_req = authed(
        "POST",
        "/api/routes/api",
        Body::from(json!({"target": "http://127.0.0.1:9001"}).to_string()),
    );
    let resp = app.clone().oneshot(create_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let get_req = authed("GET", "/api/routes/api", Body::empty());
    let resp = app.oneshot(get_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let value = body_json(resp).await;
    assert_eq!(value["target"], "http://127.0.0.1:9001");
}

#[tokio::test]
async fn upsert_with_missing_target_is_bad_request() {
    let resp = app()
        .oneshot(authed(
            "POST",
            "/api/routes/api",
            Body::from(json!({"data": {"x": 1}}).to_string()),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_unknown_prefix_is_not_found() {
    let resp = app()
        .oneshot(authed("GET", "/api/routes/nope", Body::empty()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let app = app();
    let resp = app
        .clone()
        .oneshot(authed("DELETE", "/api/routes/ghost", Body::empty()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = app
        .oneshot(authed("DELETE", "/api/routes/ghost", Body::empty()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn put_is_alias_of_post() {
    let resp = app()
        .oneshot(authed(
            "PUT",
            "/api/routes/api",
            Body::from(json!({"target": "http://127.0.0.1:9002"}).to_string()),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn list_filters_by_inactive_since() {
    let app = app();
    let resp = app
        .clone()
        .oneshot(authed(
            "POST",
            "/api/routes/stale",
            Body::from(json!({"target": "http://127.0.0.1:9003"}).to_string()),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let future = (Utc::now() + chrono::Duration::seconds(60)).to_rfc3339();
    let uri = format!("/api/routes?inactive_since={future}");
    let resp = app.oneshot(authed("GET", &uri, Body::empty())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let value = body_json(resp).await;
    assert!(value.as_object().unwrap().contains_key("/stale"));
}

#[tokio::test]
async fn missing_auth_header_is_rejected() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/api/routes")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
