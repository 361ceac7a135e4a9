// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! `POST /permission` and `POST /visualize-condition`.

use axum::{Json, extract::State, http::StatusCode};
use permix_core::model::PermissionDefinition;
use permix_eval::parser::parse;
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    handlers::{require_non_empty, with_deadline},
    state::{AppState, WRITE_DEADLINE},
};

#[derive(Debug, Deserialize)]
pub struct UpsertPermissionRequest {
    pub entity_type: String,
    pub permission_name: String,
    pub condition_expression: String,
    pub description: Option<String>,
}

/// `POST /permission`.
///
/// This inserts and relies on the `(entity_type, permission_name)` unique
/// constraint to reject a duplicate: it does not update an existing row;
/// callers must delete-then-create to change an expression.
pub async fn upsert_permission(
    State(state): State<AppState>,
    Json(req): Json<UpsertPermissionRequest>,
) -> Result<(StatusCode, Json<PermissionDefinition>), ApiError> {
    require_non_empty(&req.entity_type, "entity_type")?;
    require_non_empty(&req.permission_name, "permission_name")?;
    require_non_empty(&req.condition_expression, "condition_expression")?;

    let definition = with_deadline(
        WRITE_DEADLINE,
        state.store.add_permission_definition(
            &req.entity_type,
            &req.permission_name,
            &req.condition_expression,
            req.description.as_deref(),
        ),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(definition)))
}

#[derive(Debug, Deserialize)]
pub struct VisualizeConditionRequest {
    pub condition: String,
}

#[derive(Debug, Serialize)]
pub struct VisualizeConditionResponse {
    pub canonical: String,
}

/// `POST /visualize-condition`: parse a condition string and return its
/// canonicalised (fully-parenthesised) form, for a schema-explorer UI.
pub async fn visualize_condition(Json(req): Json<VisualizeConditionRequest>) -> Result<Json<VisualizeConditionResponse>, ApiError> {
    require_non_empty(&req.condition, "condition")?;
    let expr = parse(&req.condition).map_err(|e| permix_core::error::Error::ConditionParseFailure(e.to_string()))?;
    Ok(Json(VisualizeConditionResponse {
        canonical: expr.to_string(),
    }))
}
