// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Catalog data types shared by the schema, storage, and evaluation crates.
//!
//! These are the "nouns" of the system: entities, relation edges,
//! permission/rule definitions, and the bookkeeping rows the migrator
//! appends. They are intentionally free of any storage-engine detail (no
//! `sqlx::FromRow` here) — `permix-store` owns the mapping from catalog rows
//! to these types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// A typed, externally identified node in the identity graph.
///
/// Identity is the `(type, external_id)` pair; it is unique
/// together. `properties` carries both declared attribute values and any
/// other domain data the caller wants to stash on the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity type, e.g. `"user"`, `"document"`.
    #[serde(rename = "type")]
    pub type_: String,
    /// Caller-supplied identifier, unique within `type`.
    pub external_id: String,
    /// Free-form JSON properties, including attribute values.
    #[serde(default)]
    pub properties: Json,
    /// Whether this row was auto-created as a stub by `create_relation`.
    #[serde(default)]
    pub auto_created: bool,
    /// Creation timestamp (UTC).
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp (UTC).
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Read a single attribute out of `properties` by name.
    ///
    /// Returns `None` if the key is absent; the schema's attribute
    /// declarations are advisory only — the evaluator reads whatever is
    /// actually present.
    pub fn attribute(&self, name: &str) -> Option<&Json> {
        self.properties.as_object().and_then(|map| map.get(name))
    }
}

/// A directed relation edge: `(subject_type, subject_id, relation, object_type, object_id)`.
///
/// Multiple edges between the same pair with different relation names are
/// allowed, and duplicates of the identical tuple are not rejected; no
/// de-duplication is assumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationEdge {
    /// Subject entity type.
    pub subject_type: String,
    /// Subject entity id.
    pub subject_id: String,
    /// Relation name, e.g. `"owner"`, `"admin"`.
    pub relation: String,
    /// Object entity type.
    pub object_type: String,
    /// Object entity id.
    pub object_id: String,
    /// Creation timestamp (UTC).
    pub created_at: DateTime<Utc>,
}

/// A named boolean expression attached to an entity type
/// `(entity_type, permission_name) -> condition_expression`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    /// The entity type this permission is defined on.
    pub entity_type: String,
    /// The permission's name, unique within `entity_type`.
    pub permission_name: String,
    /// The condition expression, stored verbatim and parsed on demand.
    pub condition_expression: String,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Creation timestamp (UTC).
    pub created_at: DateTime<Utc>,
}

/// A rule parameter: `(name, data_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleParameter {
    /// Parameter name, referenced positionally and by name inside the rule
    /// body.
    pub name: String,
    /// Declared data type.
    pub data_type: AttributeDataType,
}

/// A named, parameterised boolean expression usable from permission
/// definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Rule name, globally unique.
    pub name: String,
    /// Ordered parameter list; positional arguments bind to these by index.
    pub parameters: Vec<RuleParameter>,
    /// The rule's body expression, stored verbatim.
    pub expression: String,
    /// Optional human-readable description.
    pub description: Option<String>,
}

/// Declared attribute data type.
///
/// Array variants (e.g. `string[]`) are represented via `array: true`
/// rather than a separate enum variant per scalar, so scalar/array pairing
/// can't drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDataType {
    /// The scalar kind.
    pub scalar: ScalarType,
    /// Whether this is declared as an array of `scalar`.
    pub array: bool,
}

impl AttributeDataType {
    /// Construct a scalar (non-array) data type.
    pub const fn scalar(scalar: ScalarType) -> Self {
        Self {
            scalar,
            array: false,
        }
    }

    /// Construct an array-of-`scalar` data type.
    pub const fn array_of(scalar: ScalarType) -> Self {
        Self {
            scalar,
            array: true,
        }
    }
}

/// The four scalar kinds the schema DSL supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// `boolean`.
    Boolean,
    /// `string`.
    String,
    /// `integer`.
    Integer,
    /// `double`.
    Double,
}

/// A declared attribute on an entity, as seen in the schema source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDeclaration {
    /// Attribute name.
    pub name: String,
    /// Declared data type.
    pub data_type: AttributeDataType,
}

/// A declared relation on an entity, as seen in the schema source:
/// `relation <name> @ <target-entity-type>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDeclaration {
    /// Relation name.
    pub name: String,
    /// Target entity type this relation points at.
    pub target_type: String,
}

/// One `entity { ... }` block from the schema source, parsed form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Entity type name.
    pub name: String,
    /// Declared relations, in source order.
    pub relations: Vec<RelationDeclaration>,
    /// Declared attributes, in source order.
    pub attributes: Vec<AttributeDeclaration>,
    /// Permission definitions, name -> condition expression source.
    pub permissions: BTreeMap<String, PermissionSource>,
}

/// A permission's condition expression as written in the schema, plus the
/// optional doc/description captured alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionSource {
    /// The raw condition expression text, e.g. `"owner or org.admin"`.
    pub expression: String,
    /// Optional description (not part of the schema grammar itself, but
    /// preserved for round-tripping descriptions set via the admin API).
    pub description: Option<String>,
}

/// The parsed representation of a `.perm` source file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    /// Entity type name -> parsed entity schema.
    pub entities: BTreeMap<String, EntitySchema>,
    /// Rule name -> parsed rule definition.
    pub rules: BTreeMap<String, RuleDefinition>,
    /// Path of the `.perm` file this model was parsed from, if any.
    pub source_file: Option<String>,
}

/// A monotonically increasing version applied to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Version number, strictly increasing.
    pub version: i64,
    /// Human-readable description of the change.
    pub description: String,
    /// Source file the model was read from.
    pub source_file: String,
    /// When this version was applied.
    pub applied_at: DateTime<Utc>,
}

/// One row of the append-only migration ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationHistoryEntry {
    /// The version this attempt targeted (`v + 1`).
    pub version: i64,
    /// Whether the apply committed successfully.
    pub success: bool,
    /// Error text, present only when `success` is false.
    pub error: Option<String>,
    /// Rendered diff text describing what this apply changed.
    pub diff: String,
    /// When this history row was appended.
    pub created_at: DateTime<Utc>,
}
