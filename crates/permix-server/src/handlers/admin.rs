// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Read-only admin/visualisation endpoints:
//! `/api/permission-definitions`, `/api/entity-types`, `/api/relations`,
//! `/api/graph`.

use axum::{Json, extract::{Query, State}};
use permix_core::{
    graph::{EntityTypeCount, GraphEdge},
    model::{PermissionDefinition, RelationEdge},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    handlers::with_deadline,
    state::{AppState, READ_DEADLINE},
};

/// `GET /api/permission-definitions`.
pub async fn list_permission_definitions(State(state): State<AppState>) -> Result<Json<Vec<PermissionDefinition>>, ApiError> {
    let definitions = with_deadline(READ_DEADLINE, state.store.list_permission_definitions()).await?;
    Ok(Json(definitions))
}

#[derive(Debug, Serialize)]
pub struct EntityTypeCountDto {
    pub entity_type: String,
    pub count: i64,
}

impl From<EntityTypeCount> for EntityTypeCountDto {
    fn from(value: EntityTypeCount) -> Self {
        Self {
            entity_type: value.entity_type,
            count: value.count,
        }
    }
}

/// `GET /api/entity-types`.
pub async fn list_entity_types(State(state): State<AppState>) -> Result<Json<Vec<EntityTypeCountDto>>, ApiError> {
    let counts = with_deadline(READ_DEADLINE, state.store.entity_type_counts()).await?;
    Ok(Json(counts.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ListRelationsQuery {
    pub entity_type: Option<String>,
    pub relation: Option<String>,
    #[serde(default = "default_relations_limit")]
    pub limit: i64,
}

fn default_relations_limit() -> i64 {
    100
}

/// `GET /api/relations?entity_type=&relation=&limit=`.
pub async fn list_relations(State(state): State<AppState>, Query(query): Query<ListRelationsQuery>) -> Result<Json<Vec<RelationEdge>>, ApiError> {
    let relations = with_deadline(
        READ_DEADLINE,
        state
            .store
            .list_relations(query.entity_type.as_deref(), query.relation.as_deref(), query.limit),
    )
    .await?;
    Ok(Json(relations))
}

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    pub entity_type: String,
    pub entity_id: String,
    pub relation_type: Option<String>,
    #[serde(default = "default_graph_depth")]
    pub depth: usize,
}

fn default_graph_depth() -> usize {
    permix_eval::evaluator::RELATION_DEPTH_CAP
}

#[derive(Debug, Serialize)]
pub struct GraphEdgeDto {
    #[serde(flatten)]
    pub edge: RelationEdge,
    pub depth: usize,
}

impl From<GraphEdge> for GraphEdgeDto {
    fn from(value: GraphEdge) -> Self {
        Self {
            edge: value.edge,
            depth: value.depth,
        }
    }
}

/// `GET /api/graph?entity_type=&entity_id=&relation_type=&depth=`: BFS
/// subgraph for visualisation, capped at the same depth used for
/// evaluation traversal unless the caller asks for less.
pub async fn graph(State(state): State<AppState>, Query(query): Query<GraphQuery>) -> Result<Json<Vec<GraphEdgeDto>>, ApiError> {
    let depth = query.depth.min(permix_eval::evaluator::RELATION_DEPTH_CAP);
    let edges = with_deadline(
        READ_DEADLINE,
        state
            .store
            .graph_bfs(&query.entity_type, &query.entity_id, query.relation_type.as_deref(), depth),
    )
    .await?;
    Ok(Json(edges.into_iter().map(Into::into).collect()))
}
