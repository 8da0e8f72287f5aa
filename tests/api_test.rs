mod helpers;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use helpers::{group, user};
use rapport::api;
use rapport::attitude::directory::StaticDirectory;
use rapport::attitude::manage::AttitudeService;
use rapport::attitude::store::{KvStore, MemoryStore};
use rapport::attitude::types::{DirectorySnapshot, Partition};
use rapport::retry::RetryPolicy;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

fn setup_app() -> (axum::Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let directory = StaticDirectory::new(DirectorySnapshot::new(
        vec![user(2, "alice", "u2")],
        vec![group(10, "Rustaceans", "group_10")],
    ));
    let service = AttitudeService::new(store.clone(), Arc::new(directory), RetryPolicy::none());
    (api::router(Arc::new(service)), store)
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

#[tokio::test]
async fn put_creates_then_get_returns_record() {
    let (app, _) = setup_app();

    let response = app
        .clone()
        .oneshot(request("PUT", "/users/u2", Some(json!({ "attitude": "warm" }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["attitude"], "warm");

    let response = app.oneshot(request("GET", "/users/u2", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["user_id"], "u2");
    assert_eq!(body["relationship"], "");
}

#[tokio::test]
async fn missing_record_is_404() {
    let (app, _) = setup_app();

    let response = app.clone().oneshot(request("GET", "/groups/group_10", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert!(body["detail"].as_str().unwrap().contains("group_10"));

    let response = app.oneshot(request("DELETE", "/users/u9", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_field_is_400() {
    let (app, store) = setup_app();
    let response = app
        .oneshot(request(
            "PUT",
            "/groups/group_10",
            Some(json!({ "attitude": "x".repeat(201) })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn delete_reports_success() {
    let (app, store) = setup_app();
    app.clone()
        .oneshot(request("PUT", "/groups/group_10", Some(json!({ "other": "memes" }))))
        .await
        .unwrap();

    let response = app.oneshot(request("DELETE", "/groups/group_10", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert!(store.get("group_10", Partition::GroupInfo).await.unwrap().is_none());
}

#[tokio::test]
async fn list_skips_malformed_records() {
    let (app, store) = setup_app();
    app.clone()
        .oneshot(request("PUT", "/users/u2", Some(json!({}))))
        .await
        .unwrap();
    store.set("u3", Partition::UserInfo, "{oops").await.unwrap();

    let response = app.oneshot(request("GET", "/users", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["user_id"], "u2");
}

#[tokio::test]
async fn unreadable_body_gets_json_detail() {
    let (app, store) = setup_app();

    let malformed = Request::builder()
        .method("PUT")
        .uri("/users/u2")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(malformed).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert!(body["detail"].is_string());

    let wrong_type = request("PUT", "/groups/group_10", Some(json!({ "attitude": 5 })));
    let response = app.oneshot(wrong_type).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert!(body["detail"].is_string());
    assert_eq!(store.write_count(), 0);
}
