// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! `POST /check` and `POST /api/permission-path`.
//!
//! Both share a request shape; `/api/permission-path` additionally walks
//! the graph to surface the granting edges rather than just the boolean.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use permix_eval::Evaluator;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json_;

use crate::{
    audit::{PermissionCheckEvent, spawn_audit},
    error::ApiError,
    handlers::{request_meta, require_non_empty, with_deadline},
    state::{AppState, READ_DEADLINE},
};

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub subject_type: String,
    pub subject_id: String,
    pub permission: String,
    pub object_type: String,
    pub object_id: String,
    #[serde(default)]
    pub context: Json_,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn decision_response(status: StatusCode, allowed: bool, error: Option<String>) -> Response {
    (status, Json(CheckResponse { allowed, error })).into_response()
}

/// `POST /check`.
pub async fn check(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<CheckRequest>) -> Response {
    match check_inner(&state, &req).await {
        Ok(allowed) => {
            audit_check(&state, &req, &headers, Some(allowed));
            decision_response(StatusCode::OK, allowed, None)
        }
        Err(err) => {
            let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            audit_check(&state, &req, &headers, None);
            decision_response(status, false, Some(err.to_string()))
        }
    }
}

async fn check_inner(state: &AppState, req: &CheckRequest) -> permix_core::Result<bool> {
    require_non_empty(&req.subject_type, "subject_type")?;
    require_non_empty(&req.subject_id, "subject_id")?;
    require_non_empty(&req.permission, "permission")?;
    require_non_empty(&req.object_type, "object_type")?;
    require_non_empty(&req.object_id, "object_id")?;

    with_deadline(READ_DEADLINE, async {
        let definition = state
            .store
            .get_permission_definition(&req.object_type, &req.permission)
            .await?
            .ok_or_else(|| permix_core::error::Error::PermissionDefinitionNotFound {
                object_type: req.object_type.clone(),
                permission: req.permission.clone(),
            })?;

        let evaluator = Evaluator::new(state.store.as_ref());
        evaluator
            .check(
                &definition.condition_expression,
                &req.subject_type,
                &req.subject_id,
                &req.object_type,
                &req.object_id,
                &req.context,
            )
            .await
    })
    .await
}

fn audit_check(state: &AppState, req: &CheckRequest, headers: &HeaderMap, result: Option<bool>) {
    let audit = state.audit.clone();
    let event = PermissionCheckEvent {
        subject_type: req.subject_type.clone(),
        subject_id: req.subject_id.clone(),
        permission: req.permission.clone(),
        object_type: req.object_type.clone(),
        object_id: req.object_id.clone(),
        context: req.context.clone(),
        result,
        meta: request_meta(headers),
    };
    spawn_audit(async move { audit.log_permission_check(event).await });
}

#[derive(Debug, Serialize)]
pub struct PermissionPathResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub paths: Vec<Vec<permix_core::model::RelationEdge>>,
}

/// `POST /api/permission-path`: same inputs as `/check`, but surfaces the
/// discovered graph edges instead of only the boolean.
pub async fn permission_path(State(state): State<AppState>, Json(req): Json<CheckRequest>) -> Result<Json<PermissionPathResponse>, ApiError> {
    require_non_empty(&req.subject_type, "subject_type")?;
    require_non_empty(&req.object_type, "object_type")?;

    let allowed = with_deadline(READ_DEADLINE, async {
        let definition = state
            .store
            .get_permission_definition(&req.object_type, &req.permission)
            .await?
            .ok_or_else(|| permix_core::error::Error::PermissionDefinitionNotFound {
                object_type: req.object_type.clone(),
                permission: req.permission.clone(),
            })?;
        let evaluator = Evaluator::new(state.store.as_ref());
        evaluator
            .check(
                &definition.condition_expression,
                &req.subject_type,
                &req.subject_id,
                &req.object_type,
                &req.object_id,
                &req.context,
            )
            .await
    })
    .await?;

    // The graph walk below is a best-effort visualisation aid: it surfaces
    // edges touching the object up to the relation depth cap, not a proof
    // tied to the specific condition expression (the evaluator already
    // made the authoritative decision above).
    let edges = if allowed {
        state
            .store
            .graph_bfs(&req.object_type, &req.object_id, None, permix_eval::evaluator::RELATION_DEPTH_CAP)
            .await?
            .into_iter()
            .map(|e| vec![e.edge])
            .collect()
    } else {
        Vec::new()
    };

    Ok(Json(PermissionPathResponse {
        allowed,
        error: None,
        paths: edges,
    }))
}
