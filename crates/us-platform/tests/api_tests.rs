//! API Endpoint Tests
//!
//! Tests for:
//! - Status mapping for every users route
//! - Request validation and malformed bodies
//! - Sink failures never changing a response

use std::sync::Arc;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use us_config::{DispatchMode, TopicConfig};
use us_events::{ChangeNotifier, InMemoryEventSink};
use us_platform::{create_router, sample_users, InMemoryUserRepository, ListPolicy, UserService, UsersState};

fn create_test_app() -> (Router, Arc<InMemoryEventSink>) {
    create_test_app_with(InMemoryUserRepository::new())
}

fn create_test_app_with(repo: InMemoryUserRepository) -> (Router, Arc<InMemoryEventSink>) {
    let repo = Arc::new(repo);
    repo.seed(sample_users(Utc::now()));

    let sink = Arc::new(InMemoryEventSink::new());
    let notifier = ChangeNotifier::new(sink.clone(), TopicConfig::default())
        .with_dispatch_mode(DispatchMode::Inline);
    let state = UsersState {
        user_service: Arc::new(UserService::new(repo, Arc::new(notifier))),
        default_limit: 10,
    };

    (create_router(state), sink)
}

async fn get_body_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// ============================================================================
// List
// ============================================================================

#[tokio::test]
async fn test_list_defaults() {
    let (app, _) = create_test_app();

    let response = app.oneshot(empty_request(Method::GET, "/api/v1/users")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert_eq!(json["total"], 2);
    assert_eq!(json["limit"], 10);
    assert_eq!(json["offset"], 0);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"][0]["userId"], "1");
    assert_eq!(json["data"][1]["userId"], "2");
}

#[tokio::test]
async fn test_list_paging() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(empty_request(Method::GET, "/api/v1/users?limit=1&offset=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["userId"], "2");
    assert_eq!(json["total"], 2);
}

#[tokio::test]
async fn test_list_zero_limit_is_empty() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(empty_request(Method::GET, "/api/v1/users?limit=0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert!(json["data"].as_array().unwrap().is_empty());
    assert_eq!(json["limit"], 0);
}

#[tokio::test]
async fn test_list_blank_query_values_use_defaults() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(empty_request(Method::GET, "/api/v1/users?limit=&offset="))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert_eq!(json["limit"], 10);
    assert_eq!(json["offset"], 0);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_reports_applied_paging() {
    let (app, _) = create_test_app_with(
        InMemoryUserRepository::new().with_list_policy(ListPolicy::ClampToDefault(10)),
    );

    let response = app
        .oneshot(empty_request(Method::GET, "/api/v1/users?limit=0&offset=-5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert_eq!(json["limit"], 10);
    assert_eq!(json["offset"], 0);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_bad_query_is_bad_request() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(empty_request(Method::GET, "/api/v1/users?limit=lots"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert_eq!(json["error"], "VALIDATION_ERROR");
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_user() {
    let (app, sink) = create_test_app();

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/users",
            json!({ "name": "Anna Sidorova", "email": "anna@example.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert!(!json["userId"].as_str().unwrap().is_empty());
    assert_eq!(json["status"], "ACTIVE");
    assert_eq!(json["createdAt"], json["updatedAt"]);
    assert_eq!(sink.messages_for("user/created").len(), 1);
}

#[tokio::test]
async fn test_create_validation_errors() {
    let (app, sink) = create_test_app();

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/users",
            json!({ "name": "A", "email": "nope" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert_eq!(json["error"], "VALIDATION_ERROR");
    let message = json["message"].as_str().unwrap();
    assert!(message.contains("Name must be between 2 and 100 characters"));
    assert!(message.contains("Email should be valid"));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_create_missing_fields() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(json_request(Method::POST, "/api/v1/users", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert!(json["message"].as_str().unwrap().contains("Name is required"));
}

#[tokio::test]
async fn test_create_duplicate_id_conflicts() {
    let (app, sink) = create_test_app();

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/users",
            json!({ "userId": "1", "name": "Other Ivan", "email": "other@example.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert_eq!(json["error"], "DUPLICATE");
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _) = create_test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert_eq!(json["error"], "VALIDATION_ERROR");
}

// ============================================================================
// Get / Update / Profile / Delete
// ============================================================================

#[tokio::test]
async fn test_get_user() {
    let (app, _) = create_test_app();

    let response = app.oneshot(empty_request(Method::GET, "/api/v1/users/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert_eq!(json["name"], "Ivan Ivanov");
    assert_eq!(json["phoneNumber"], "+79001234567");
}

#[tokio::test]
async fn test_unknown_user_is_empty_not_found() {
    let (app, sink) = create_test_app();

    let requests = vec![
        empty_request(Method::GET, "/api/v1/users/404"),
        json_request(Method::PUT, "/api/v1/users/404", json!({ "name": "Nobody", "email": "n@example.com" })),
        json_request(Method::PATCH, "/api/v1/users/404/profile", json!({ "name": "Nobody" })),
        empty_request(Method::DELETE, "/api/v1/users/404"),
    ];

    for request in requests {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(get_body_string(response.into_body()).await.is_empty());
    }
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_update_user() {
    let (app, sink) = create_test_app();

    let response = app
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/users/2",
            json!({ "name": "Petr Sidorov", "email": "petr.s@example.com", "status": "BLOCKED" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert_eq!(json["userId"], "2");
    assert_eq!(json["name"], "Petr Sidorov");
    assert_eq!(json["status"], "BLOCKED");
    assert!(json["phoneNumber"].is_null());
    assert_eq!(sink.messages_for("user/updated").len(), 1);
}

#[tokio::test]
async fn test_update_validates_body() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(json_request(Method::PUT, "/api/v1/users/1", json!({ "name": "Ivan", "email": "" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_profile() {
    let (app, sink) = create_test_app();

    let response = app
        .oneshot(json_request(
            Method::PATCH,
            "/api/v1/users/1/profile",
            json!({ "phoneNumber": "+1000" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert_eq!(json["phoneNumber"], "+1000");
    assert_eq!(json["name"], "Ivan Ivanov");

    let messages = sink.messages_for("user/profile-updated");
    assert_eq!(messages.len(), 1);
    let payload: Value = serde_json::from_str(&messages[0].payload).unwrap();
    assert_eq!(payload["data"]["updates"], json!({ "phoneNumber": "+1000" }));
}

#[tokio::test]
async fn test_update_profile_rejects_bad_bodies() {
    let (app, sink) = create_test_app();

    let bodies = vec![json!(["not", "an", "object"]), json!({ "name": "A" }), json!({ "phoneNumber": 5 })];
    for body in bodies {
        let response = app
            .clone()
            .oneshot(json_request(Method::PATCH, "/api/v1/users/1/profile", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_delete_user() {
    let (app, sink) = create_test_app();

    let response = app
        .clone()
        .oneshot(empty_request(Method::DELETE, "/api/v1/users/2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(get_body_string(response.into_body()).await.is_empty());

    let response = app.oneshot(empty_request(Method::GET, "/api/v1/users/2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(sink.messages_for("user/deleted").len(), 1);
}

// ============================================================================
// Sink Failures
// ============================================================================

#[tokio::test]
async fn test_failing_sink_does_not_change_status() {
    let (app, sink) = create_test_app();
    sink.set_failing(true);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/users",
            json!({ "name": "Anna Sidorova", "email": "anna@example.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(json_request(Method::PATCH, "/api/v1/users/1/profile", json!({ "name": "Ivan I" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(empty_request(Method::DELETE, "/api/v1/users/2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(empty_request(Method::GET, "/api/v1/users")).await.unwrap();
    let json: Value = serde_json::from_str(&get_body_string(response.into_body()).await).unwrap();
    assert_eq!(json["total"], 2);
    assert!(sink.is_empty());
}
