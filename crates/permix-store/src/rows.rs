// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! `sqlx::FromRow` mappings between catalog tables and `permix-core`'s
//! storage-agnostic domain types.

use chrono::{DateTime, Utc};
use permix_core::{
    error::Error,
    model::{Entity, ModelVersion, PermissionDefinition, RelationEdge, RuleDefinition, RuleParameter},
};
use serde_json::Value as Json;

#[derive(sqlx::FromRow)]
pub struct EntityRow {
    pub r#type: String,
    pub external_id: String,
    pub properties: Json,
    pub auto_created: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EntityRow> for Entity {
    fn from(row: EntityRow) -> Self {
        Entity {
            type_: row.r#type,
            external_id: row.external_id,
            properties: row.properties,
            auto_created: row.auto_created,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct RelationRow {
    pub subject_type: String,
    pub subject_id: String,
    pub relation: String,
    pub object_type: String,
    pub object_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<RelationRow> for RelationEdge {
    fn from(row: RelationRow) -> Self {
        RelationEdge {
            subject_type: row.subject_type,
            subject_id: row.subject_id,
            relation: row.relation,
            object_type: row.object_type,
            object_id: row.object_id,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct PermissionDefinitionRow {
    pub entity_type: String,
    pub permission_name: String,
    pub condition_expression: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<PermissionDefinitionRow> for PermissionDefinition {
    fn from(row: PermissionDefinitionRow) -> Self {
        PermissionDefinition {
            entity_type: row.entity_type,
            permission_name: row.permission_name,
            condition_expression: row.condition_expression,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct RuleDefinitionRow {
    pub rule_name: String,
    pub parameters: Json,
    pub expression: String,
    pub description: Option<String>,
}

impl TryFrom<RuleDefinitionRow> for RuleDefinition {
    type Error = Error;

    fn try_from(row: RuleDefinitionRow) -> Result<Self, Self::Error> {
        let parameters: Vec<RuleParameter> = serde_json::from_value(row.parameters)
            .map_err(|e| Error::StorageFailure(format!("malformed rule parameters for '{}': {e}", row.rule_name)))?;
        Ok(RuleDefinition {
            name: row.rule_name,
            parameters,
            expression: row.expression,
            description: row.description,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct ModelVersionRow {
    pub version: i64,
    pub description: String,
    pub source_file: String,
    pub applied_at: DateTime<Utc>,
}

impl From<ModelVersionRow> for ModelVersion {
    fn from(row: ModelVersionRow) -> Self {
        ModelVersion {
            version: row.version,
            description: row.description,
            source_file: row.source_file,
            applied_at: row.applied_at,
        }
    }
}
