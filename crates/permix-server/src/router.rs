// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Router assembly.

use axum::{
    Router,
    http::HeaderName,
    routing::{get, post},
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{handlers, state::AppState};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the full router: a single HTTP listener with a router, CORS
/// permissive by default, leaving tighter policy to deployment.
pub fn build_router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/check", post(handlers::check::check))
        .route("/entity", post(handlers::entity::create_entity).get(handlers::entity::get_entity))
        .route("/relation", post(handlers::relation::create_relation))
        .route("/test-relation", post(handlers::relation::test_relation))
        .route("/permission", post(handlers::permission::upsert_permission))
        .route("/visualize-condition", post(handlers::permission::visualize_condition))
        .route("/api/permission-definitions", get(handlers::admin::list_permission_definitions))
        .route("/api/entity-types", get(handlers::admin::list_entity_types))
        .route("/api/relations", get(handlers::admin::list_relations))
        .route("/api/graph", get(handlers::admin::graph))
        .route("/api/permission-path", post(handlers::check::permission_path))
        .route("/api/audit/logs", get(handlers::audit_logs::list_audit_logs))
        .route("/api/audit/logs/{id}", get(handlers::audit_logs::get_audit_log))
        .route("/health", get(handlers::health::health))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}
