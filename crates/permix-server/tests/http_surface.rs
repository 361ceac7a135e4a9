// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! End-to-end exercises of the HTTP surface against [`FakeGraphStore`],
//! covering the testable scenarios around entity/relation/permission
//! creation and permission checks.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use permix_core::graph::fake::FakeGraphStore;
use permix_server::{AppState, audit::NoopAuditSink, router::build_router};
use serde_json::{Value, json};
use tower::ServiceExt;

fn test_router() -> Router {
    let store = Arc::new(FakeGraphStore::new());
    let audit = Arc::new(NoopAuditSink);
    build_router(AppState::new(store, audit))
}

async fn send(router: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn health_reports_ok() {
    let router = test_router();
    let (status, body) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn creating_an_entity_then_fetching_it_round_trips() {
    let router = test_router();
    let (status, body) = send(
        &router,
        "POST",
        "/entity",
        json!({"type": "document", "external_id": "doc-1", "properties": {"title": "quarterly report"}}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["type"], "document");
    assert_eq!(body["external_id"], "doc-1");

    let (status, body) = get(&router, "/entity?type=document&id=doc-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["properties"]["title"], "quarterly report");
}

#[tokio::test]
async fn creating_a_duplicate_entity_is_rejected() {
    let router = test_router();
    let payload = json!({"type": "document", "external_id": "doc-1", "properties": {}});
    let (status, _) = send(&router, "POST", "/entity", payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&router, "POST", "/entity", payload).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "entity_already_exists");
}

#[tokio::test]
async fn fetching_a_missing_entity_returns_404_with_error_envelope() {
    let router = test_router();
    let (status, body) = get(&router, "/entity?type=document&id=missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "entity_not_found");
}

#[tokio::test]
async fn creating_a_relation_auto_stubs_missing_endpoints() {
    let router = test_router();
    let (status, body) = send(
        &router,
        "POST",
        "/relation",
        json!({"subject_type": "user", "subject_id": "alice", "relation": "owner", "object_type": "document", "object_id": "doc-1"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["subject_id"], "alice");

    let (status, body) = get(&router, "/entity?type=user&id=alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["auto_created"], true);
}

#[tokio::test]
async fn test_relation_reports_existence_in_both_directions_by_default() {
    let router = test_router();
    send(
        &router,
        "POST",
        "/relation",
        json!({"subject_type": "user", "subject_id": "alice", "relation": "owner", "object_type": "document", "object_id": "doc-1"}),
    )
    .await;

    let (status, body) = send(
        &router,
        "POST",
        "/test-relation",
        json!({"subject_type": "document", "subject_id": "doc-1", "relation": "owner", "object_type": "user", "object_id": "alice", "direction": "reverse"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exists"], true);
}

#[tokio::test]
async fn check_grants_permission_when_the_condition_is_satisfied() {
    let router = test_router();
    send(
        &router,
        "POST",
        "/relation",
        json!({"subject_type": "user", "subject_id": "alice", "relation": "owner", "object_type": "document", "object_id": "doc-1"}),
    )
    .await;
    send(
        &router,
        "POST",
        "/permission",
        json!({"entity_type": "document", "permission_name": "view", "condition_expression": "owner"}),
    )
    .await;

    let (status, body) = send(
        &router,
        "POST",
        "/check",
        json!({"subject_type": "user", "subject_id": "alice", "permission": "view", "object_type": "document", "object_id": "doc-1", "context": {}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn check_denies_when_no_relation_satisfies_the_condition() {
    let router = test_router();
    send(
        &router,
        "POST",
        "/permission",
        json!({"entity_type": "document", "permission_name": "view", "condition_expression": "owner"}),
    )
    .await;

    let (status, body) = send(
        &router,
        "POST",
        "/check",
        json!({"subject_type": "user", "subject_id": "bob", "permission": "view", "object_type": "document", "object_id": "doc-1", "context": {}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn check_against_an_undefined_permission_returns_404_but_still_carries_the_decision_shape() {
    let router = test_router();
    let (status, body) = send(
        &router,
        "POST",
        "/check",
        json!({"subject_type": "user", "subject_id": "alice", "permission": "nonexistent", "object_type": "document", "object_id": "doc-1", "context": {}}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["allowed"], false);
    assert!(body["error"].as_str().unwrap().contains("permission definition not found"));
}

#[tokio::test]
async fn check_rejects_a_blank_required_field() {
    let router = test_router();
    let (status, body) = send(
        &router,
        "POST",
        "/check",
        json!({"subject_type": "", "subject_id": "alice", "permission": "view", "object_type": "document", "object_id": "doc-1", "context": {}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn duplicate_permission_definitions_are_rejected() {
    let router = test_router();
    let payload = json!({"entity_type": "document", "permission_name": "view", "condition_expression": "owner"});
    let (status, _) = send(&router, "POST", "/permission", payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&router, "POST", "/permission", payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
}

#[tokio::test]
async fn visualize_condition_returns_a_canonical_rendering() {
    let router = test_router();
    let (status, body) = send(
        &router,
        "POST",
        "/visualize-condition",
        json!({"condition": "owner or editor"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["canonical"], "(owner or editor)");
}

#[tokio::test]
async fn admin_listings_reflect_created_rows() {
    let router = test_router();
    send(&router, "POST", "/entity", json!({"type": "document", "external_id": "doc-1", "properties": {}})).await;
    send(
        &router,
        "POST",
        "/relation",
        json!({"subject_type": "user", "subject_id": "alice", "relation": "owner", "object_type": "document", "object_id": "doc-1"}),
    )
    .await;

    let (status, body) = get(&router, "/api/entity-types").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().iter().any(|c| c["entity_type"] == "document"));

    let (status, body) = get(&router, "/api/relations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = get(&router, "/api/graph?entity_type=document&entity_id=doc-1&depth=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn audit_logs_are_empty_under_the_noop_sink() {
    let router = test_router();
    let (status, body) = get(&router, "/api/audit/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}
