// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! `POST /entity` and `GET /entity`.

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use permix_core::model::Entity;
use serde::Deserialize;
use serde_json::Value as Json_;

use crate::{
    audit::{EntityEvent, spawn_audit},
    error::ApiError,
    handlers::{request_meta, require_non_empty, with_deadline},
    state::{AppState, READ_DEADLINE, WRITE_DEADLINE},
};

#[derive(Debug, Deserialize)]
pub struct CreateEntityRequest {
    #[serde(rename = "type")]
    pub type_: String,
    pub external_id: String,
    #[serde(default)]
    pub properties: Json_,
}

/// `POST /entity`: `validate -> check-existence -> write -> async-audit ->
/// respond`.
pub async fn create_entity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateEntityRequest>,
) -> Result<(StatusCode, Json<Entity>), ApiError> {
    require_non_empty(&req.type_, "type")?;
    require_non_empty(&req.external_id, "external_id")?;

    let entity = with_deadline(WRITE_DEADLINE, state.store.create_entity(&req.type_, &req.external_id, req.properties)).await?;

    let audit = state.audit.clone();
    let event = EntityEvent {
        entity_type: entity.type_.clone(),
        entity_id: entity.external_id.clone(),
        meta: request_meta(&headers),
    };
    spawn_audit(async move { audit.log_entity_create(event).await });

    Ok((StatusCode::CREATED, Json(entity)))
}

#[derive(Debug, Deserialize)]
pub struct GetEntityQuery {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: String,
}

/// `GET /entity?type=…&id=…`.
pub async fn get_entity(State(state): State<AppState>, Query(query): Query<GetEntityQuery>) -> Result<Json<Entity>, ApiError> {
    require_non_empty(&query.type_, "type")?;
    require_non_empty(&query.id, "id")?;

    let entity = with_deadline(READ_DEADLINE, state.store.get_entity(&query.type_, &query.id))
        .await?
        .ok_or_else(|| permix_core::error::Error::EntityNotFound {
            type_: query.type_.clone(),
            external_id: query.id.clone(),
        })?;

    Ok(Json(entity))
}
