// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! `GET /api/audit/logs` and `GET /api/audit/logs/{id}`.
//!
//! Audit-log persistence itself is an external collaborator concern; these
//! handlers just expose whatever the configured [`crate::audit::AuditSink`]
//! reports, which is nothing for the default [`crate::audit::NoopAuditSink`].

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    audit::{AuditLogEntry, AuditLogFilter},
    error::{ApiError, ErrorBody},
    handlers::with_deadline,
    state::{AppState, READ_DEADLINE},
};

#[derive(Debug, Deserialize)]
pub struct ListAuditLogsQuery {
    #[serde(default)]
    pub limit: i64,
}

/// `GET /api/audit/logs`.
pub async fn list_audit_logs(State(state): State<AppState>, Query(query): Query<ListAuditLogsQuery>) -> Result<Json<Vec<AuditLogEntry>>, ApiError> {
    let logs = with_deadline(READ_DEADLINE, state.audit.list_logs(AuditLogFilter { limit: query.limit })).await?;
    Ok(Json(logs))
}

/// `GET /api/audit/logs/{id}`.
pub async fn get_audit_log(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match with_deadline(READ_DEADLINE, state.audit.get_log(id)).await {
        Ok(Some(log)) => Json(log).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                code: "audit_log_not_found",
                message: format!("no audit log with id {id}"),
                details: None,
            }),
        )
            .into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}
