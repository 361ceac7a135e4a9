// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! `POST /relation` and `POST /test-relation`.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use permix_core::{graph::Direction, model::RelationEdge};
use serde::{Deserialize, Serialize};

use crate::{
    audit::{RelationEvent, spawn_audit},
    error::ApiError,
    handlers::{request_meta, require_non_empty, with_deadline},
    state::{AppState, READ_DEADLINE, WRITE_DEADLINE},
};

#[derive(Debug, Deserialize)]
pub struct CreateRelationRequest {
    pub subject_type: String,
    pub subject_id: String,
    pub relation: String,
    pub object_type: String,
    pub object_id: String,
}

/// `POST /relation`: auto-stubs missing endpoints via
/// [`permix_core::graph::GraphStore::create_relation`] itself.
pub async fn create_relation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateRelationRequest>,
) -> Result<(StatusCode, Json<RelationEdge>), ApiError> {
    require_non_empty(&req.subject_type, "subject_type")?;
    require_non_empty(&req.subject_id, "subject_id")?;
    require_non_empty(&req.relation, "relation")?;
    require_non_empty(&req.object_type, "object_type")?;
    require_non_empty(&req.object_id, "object_id")?;

    let edge = with_deadline(
        WRITE_DEADLINE,
        state
            .store
            .create_relation(&req.subject_type, &req.subject_id, &req.relation, &req.object_type, &req.object_id),
    )
    .await?;

    let audit = state.audit.clone();
    let event = RelationEvent {
        subject_type: edge.subject_type.clone(),
        subject_id: edge.subject_id.clone(),
        relation: edge.relation.clone(),
        object_type: edge.object_type.clone(),
        object_id: edge.object_id.clone(),
        meta: request_meta(&headers),
    };
    spawn_audit(async move { audit.log_relation_create(event).await });

    Ok((StatusCode::CREATED, Json(edge)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionParam {
    Normal,
    Reverse,
    Both,
}

impl From<DirectionParam> for Direction {
    fn from(value: DirectionParam) -> Self {
        match value {
            DirectionParam::Normal => Direction::Normal,
            DirectionParam::Reverse => Direction::Reverse,
            DirectionParam::Both => Direction::Both,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TestRelationRequest {
    pub subject_type: String,
    pub subject_id: String,
    pub relation: String,
    pub object_type: String,
    pub object_id: String,
    #[serde(default = "default_direction")]
    pub direction: DirectionParam,
}

fn default_direction() -> DirectionParam {
    DirectionParam::Both
}

#[derive(Debug, Serialize)]
pub struct TestRelationResponse {
    pub exists: bool,
}

/// `POST /test-relation`: existence test in a caller-chosen direction,
/// defaulting to `both`, the default for direct-relation checks.
pub async fn test_relation(State(state): State<AppState>, Json(req): Json<TestRelationRequest>) -> Result<Json<TestRelationResponse>, ApiError> {
    require_non_empty(&req.subject_type, "subject_type")?;
    require_non_empty(&req.relation, "relation")?;
    require_non_empty(&req.object_type, "object_type")?;

    let exists = with_deadline(
        READ_DEADLINE,
        state.store.check_direct_relation(
            &req.subject_type,
            &req.subject_id,
            &req.relation,
            &req.object_type,
            &req.object_id,
            req.direction.into(),
        ),
    )
    .await?;

    Ok(Json(TestRelationResponse { exists }))
}
