// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The identity graph store contract.
//!
//! [`GraphStore`] is the seam between the condition evaluator / HTTP layer
//! and whatever persistence engine backs the catalog. `permix-store`
//! provides the PostgreSQL implementation; [`fake::FakeGraphStore`] provides
//! an in-memory implementation used by the evaluator's and server's own test
//! suites so that unit tests don't need a live database.

use async_trait::async_trait;
use serde_json::Value as Json;

use crate::{
    error::Result,
    model::{Entity, EntitySchema, MigrationHistoryEntry, Model, ModelVersion, PermissionDefinition, RelationEdge, RuleDefinition},
};

/// Direction to test a relation's existence in, for `/test-relation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Only `(subject -> object)`.
    Normal,
    /// Only `(object -> subject)`.
    Reverse,
    /// Either orientation (the default for direct-relation checks).
    Both,
}

/// A single hop discovered while walking the graph for
/// `/api/permission-path` or `/api/graph`.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    /// The edge itself.
    pub edge: RelationEdge,
    /// Depth at which this edge was discovered (0 = seed).
    pub depth: usize,
}

/// Distinct entity type with a row count, for `/api/entity-types`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeCount {
    /// The entity type name.
    pub entity_type: String,
    /// Number of entities of this type.
    pub count: i64,
}

/// The persistence contract for the identity graph and permission catalog.
///
/// Bidirectional relation semantics are the implementation's responsibility:
/// `check_direct_relation` and `check_indirect_relation` must each try both
/// edge orientations regardless of which orientation the caller's schema
/// happens to declare.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create an entity. Fails with `Error::EntityAlreadyExists` on a
    /// `(type, external_id)` unique violation.
    async fn create_entity(&self, type_: &str, external_id: &str, properties: Json) -> Result<Entity>;

    /// Look up an entity by its identity. `Ok(None)` means not found.
    async fn get_entity(&self, type_: &str, external_id: &str) -> Result<Option<Entity>>;

    /// Create an entity if it does not already exist, marking it
    /// `auto_created = true`.
    async fn ensure_entity_stub(&self, type_: &str, external_id: &str) -> Result<Entity>;

    /// Delete an entity. Returns whether a row was deleted.
    async fn delete_entity(&self, type_: &str, external_id: &str) -> Result<bool>;

    /// Create a directed relation edge. Auto-creates stub entities for
    /// either endpoint that doesn't already exist. Duplicates are allowed.
    async fn create_relation(
        &self,
        subject_type: &str,
        subject_id: &str,
        relation: &str,
        object_type: &str,
        object_id: &str,
    ) -> Result<RelationEdge>;

    /// Test whether a direct relation edge exists, trying the orientation(s)
    /// given by `direction`. `Direction::Both` is true if either exists.
    async fn check_direct_relation(
        &self,
        subject_type: &str,
        subject_id: &str,
        relation: &str,
        object_type: &str,
        object_id: &str,
        direction: Direction,
    ) -> Result<bool>;

    /// Recursive traversal, bounded at `depth_cap` hops, also tried in both
    /// orientations: is `(subject_type, subject_id)` reachable from
    /// `(object_type, object_id)` via a chain of `path_type`-typed
    /// intermediate hops terminating in an edge named `relation_name`,
    /// backing the `Relation{path, name}` condition dispatch.
    async fn check_indirect_relation(
        &self,
        subject_type: &str,
        subject_id: &str,
        path_type: &str,
        relation_name: &str,
        object_type: &str,
        object_id: &str,
        depth_cap: usize,
    ) -> Result<bool>;

    /// Read a single attribute from an entity's `properties`.
    async fn get_entity_attribute(
        &self,
        entity_type: &str,
        external_id: &str,
        attribute_name: &str,
    ) -> Result<Option<Json>>;

    /// Upsert-by-insert a permission definition: the admin API inserts and
    /// relies on the unique constraint; it never updates.
    async fn add_permission_definition(
        &self,
        entity_type: &str,
        permission_name: &str,
        condition_expression: &str,
        description: Option<&str>,
    ) -> Result<PermissionDefinition>;

    /// Look up a single permission definition by `(entity_type, permission_name)`.
    async fn get_permission_definition(
        &self,
        entity_type: &str,
        permission_name: &str,
    ) -> Result<Option<PermissionDefinition>>;

    /// List every permission definition in the catalog.
    async fn list_permission_definitions(&self) -> Result<Vec<PermissionDefinition>>;

    /// Persist a rule and refresh the in-memory rule cache.
    async fn add_rule(&self, rule: RuleDefinition) -> Result<()>;

    /// Look up a rule by name, consulting the in-memory cache first and
    /// triggering a one-shot reload on a cache miss.
    async fn get_rule(&self, name: &str) -> Result<Option<RuleDefinition>>;

    /// Distinct entity types present in the catalog, with row counts.
    async fn entity_type_counts(&self) -> Result<Vec<EntityTypeCount>>;

    /// List relations, optionally filtered by entity type and/or relation
    /// name, bounded by `limit`.
    async fn list_relations(
        &self,
        entity_type: Option<&str>,
        relation: Option<&str>,
        limit: i64,
    ) -> Result<Vec<RelationEdge>>;

    /// BFS outward from `(entity_type, entity_id)` up to `depth` hops,
    /// optionally restricted to a single relation type, for
    /// `/api/graph` visualisation.
    async fn graph_bfs(
        &self,
        entity_type: &str,
        entity_id: &str,
        relation_type: Option<&str>,
        depth: usize,
    ) -> Result<Vec<GraphEdge>>;

    /// Load the currently-applied model from the catalog.
    async fn load_current_model(&self) -> Result<Model>;

    /// Apply a new model: replace permission/rule definitions wholesale and
    /// append a new [`ModelVersion`], inside a single transaction. Returns
    /// the new version on success.
    async fn apply_model(
        &self,
        entities: &[EntitySchema],
        rules: &[RuleDefinition],
        description: &str,
        source_file: &str,
    ) -> Result<ModelVersion>;

    /// Read the current (highest) model version, or `None` if no model has
    /// ever been applied.
    async fn current_version(&self) -> Result<Option<ModelVersion>>;

    /// Append a migration history row without bumping the version (used
    /// for both "no changes" and failed-apply outcomes).
    async fn append_migration_history(&self, entry: MigrationHistoryEntry) -> Result<()>;

    /// Liveness check against the backing store.
    async fn ping(&self) -> Result<()>;
}

/// A deterministic in-memory [`GraphStore`] for tests.
///
/// Not used in production: the admin surface and evaluator are written
/// against the trait, not this type, but every crate's test suite can
/// depend on it without pulling in a live PostgreSQL instance.
pub mod fake {
    use std::{
        collections::{HashMap, HashSet},
        sync::Mutex,
    };

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::Value as Json;

    use super::{Direction, EntityTypeCount, GraphEdge, GraphStore};
    use crate::{
        error::{Error, Result},
        model::{Entity, EntitySchema, MigrationHistoryEntry, Model, ModelVersion, PermissionDefinition, RelationEdge, RuleDefinition},
    };

    #[derive(Default)]
    struct Inner {
        entities: HashMap<(String, String), Entity>,
        relations: Vec<RelationEdge>,
        permissions: HashMap<(String, String), PermissionDefinition>,
        rules: HashMap<String, RuleDefinition>,
        version: Option<ModelVersion>,
        history: Vec<MigrationHistoryEntry>,
    }

    /// In-memory [`GraphStore`] backed by a single [`Mutex`]. Adequate for
    /// tests; not concurrency-optimized the way `permix-store`'s
    /// connection-pooled implementation is.
    #[derive(Default)]
    pub struct FakeGraphStore {
        inner: Mutex<Inner>,
    }

    impl FakeGraphStore {
        /// Construct an empty store.
        pub fn new() -> Self {
            Self::default()
        }
    }

    fn edge_matches_direct(
        edge: &RelationEdge,
        subject_type: &str,
        subject_id: &str,
        relation: &str,
        object_type: &str,
        object_id: &str,
    ) -> bool {
        edge.relation == relation
            && edge.subject_type == subject_type
            && edge.subject_id == subject_id
            && edge.object_type == object_type
            && edge.object_id == object_id
    }

    #[async_trait]
    impl GraphStore for FakeGraphStore {
        async fn create_entity(&self, type_: &str, external_id: &str, properties: Json) -> Result<Entity> {
            let mut inner = self.inner.lock().unwrap();
            let key = (type_.to_string(), external_id.to_string());
            if inner.entities.contains_key(&key) {
                return Err(Error::EntityAlreadyExists {
                    type_: type_.into(),
                    external_id: external_id.into(),
                });
            }
            let now = Utc::now();
            let entity = Entity {
                type_: type_.into(),
                external_id: external_id.into(),
                properties,
                auto_created: false,
                created_at: now,
                updated_at: now,
            };
            inner.entities.insert(key, entity.clone());
            Ok(entity)
        }

        async fn get_entity(&self, type_: &str, external_id: &str) -> Result<Option<Entity>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .entities
                .get(&(type_.to_string(), external_id.to_string()))
                .cloned())
        }

        async fn ensure_entity_stub(&self, type_: &str, external_id: &str) -> Result<Entity> {
            let mut inner = self.inner.lock().unwrap();
            let key = (type_.to_string(), external_id.to_string());
            if let Some(existing) = inner.entities.get(&key) {
                return Ok(existing.clone());
            }
            let now = Utc::now();
            let entity = Entity {
                type_: type_.into(),
                external_id: external_id.into(),
                properties: Json::Object(Default::default()),
                auto_created: true,
                created_at: now,
                updated_at: now,
            };
            inner.entities.insert(key, entity.clone());
            Ok(entity)
        }

        async fn delete_entity(&self, type_: &str, external_id: &str) -> Result<bool> {
            let mut inner = self.inner.lock().unwrap();
            Ok(inner
                .entities
                .remove(&(type_.to_string(), external_id.to_string()))
                .is_some())
        }

        async fn create_relation(
            &self,
            subject_type: &str,
            subject_id: &str,
            relation: &str,
            object_type: &str,
            object_id: &str,
        ) -> Result<RelationEdge> {
            {
                let mut inner = self.inner.lock().unwrap();
                for (type_, id) in [(subject_type, subject_id), (object_type, object_id)] {
                    let key = (type_.to_string(), id.to_string());
                    if !inner.entities.contains_key(&key) {
                        let now = Utc::now();
                        inner.entities.insert(
                            key,
                            Entity {
                                type_: type_.into(),
                                external_id: id.into(),
                                properties: Json::Object(Default::default()),
                                auto_created: true,
                                created_at: now,
                                updated_at: now,
                            },
                        );
                    }
                }
            }
            let edge = RelationEdge {
                subject_type: subject_type.into(),
                subject_id: subject_id.into(),
                relation: relation.into(),
                object_type: object_type.into(),
                object_id: object_id.into(),
                created_at: Utc::now(),
            };
            self.inner.lock().unwrap().relations.push(edge.clone());
            Ok(edge)
        }

        async fn check_direct_relation(
            &self,
            subject_type: &str,
            subject_id: &str,
            relation: &str,
            object_type: &str,
            object_id: &str,
            direction: Direction,
        ) -> Result<bool> {
            let inner = self.inner.lock().unwrap();
            let forward = inner
                .relations
                .iter()
                .any(|e| edge_matches_direct(e, subject_type, subject_id, relation, object_type, object_id));
            let reverse = inner
                .relations
                .iter()
                .any(|e| edge_matches_direct(e, object_type, object_id, relation, subject_type, subject_id));
            Ok(match direction {
                Direction::Normal => forward,
                Direction::Reverse => reverse,
                Direction::Both => forward || reverse,
            })
        }

        async fn check_indirect_relation(
            &self,
            subject_type: &str,
            subject_id: &str,
            path_type: &str,
            relation_name: &str,
            object_type: &str,
            object_id: &str,
            depth_cap: usize,
        ) -> Result<bool> {
            let inner = self.inner.lock().unwrap();

            // BFS seeded from `object`, hopping via `path_type` edges that
            // touch the current node on either side (a node can sit as the
            // subject or the object of its path edge), looking for a
            // `relation_name` edge landing on `subject` in either
            // orientation too. Tried starting from both ends.
            let try_orientation = |start_type: &str, start_id: &str, goal_type: &str, goal_id: &str| -> bool {
                let mut visited: HashSet<(String, String)> = HashSet::new();
                let mut frontier = vec![(start_type.to_string(), start_id.to_string())];
                visited.insert(frontier[0].clone());

                for _ in 0..depth_cap {
                    if frontier.is_empty() {
                        break;
                    }
                    let mut next_frontier = Vec::new();
                    for (cur_type, cur_id) in &frontier {
                        let as_subject = |edge: &RelationEdge| edge.subject_type == *cur_type && edge.subject_id == *cur_id;
                        let as_object = |edge: &RelationEdge| edge.object_type == *cur_type && edge.object_id == *cur_id;
                        for edge in &inner.relations {
                            if edge.relation == relation_name {
                                if as_subject(edge) && edge.object_type == goal_type && edge.object_id == goal_id {
                                    return true;
                                }
                                if as_object(edge) && edge.subject_type == goal_type && edge.subject_id == goal_id {
                                    return true;
                                }
                            }
                            if edge.relation == path_type {
                                if as_subject(edge) {
                                    let key = (edge.object_type.clone(), edge.object_id.clone());
                                    if visited.insert(key.clone()) {
                                        next_frontier.push(key);
                                    }
                                }
                                if as_object(edge) {
                                    let key = (edge.subject_type.clone(), edge.subject_id.clone());
                                    if visited.insert(key.clone()) {
                                        next_frontier.push(key);
                                    }
                                }
                            }
                        }
                    }
                    frontier = next_frontier;
                }
                false
            };

            let forward = try_orientation(object_type, object_id, subject_type, subject_id);
            let reverse = try_orientation(subject_type, subject_id, object_type, object_id);
            Ok(forward || reverse)
        }

        async fn get_entity_attribute(
            &self,
            entity_type: &str,
            external_id: &str,
            attribute_name: &str,
        ) -> Result<Option<Json>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .entities
                .get(&(entity_type.to_string(), external_id.to_string()))
                .and_then(|e| e.attribute(attribute_name).cloned()))
        }

        async fn add_permission_definition(
            &self,
            entity_type: &str,
            permission_name: &str,
            condition_expression: &str,
            description: Option<&str>,
        ) -> Result<PermissionDefinition> {
            let mut inner = self.inner.lock().unwrap();
            let key = (entity_type.to_string(), permission_name.to_string());
            if inner.permissions.contains_key(&key) {
                return Err(Error::InvalidRequest(format!(
                    "permission already defined: {entity_type}.{permission_name}"
                )));
            }
            let def = PermissionDefinition {
                entity_type: entity_type.into(),
                permission_name: permission_name.into(),
                condition_expression: condition_expression.into(),
                description: description.map(|s| s.to_string()),
                created_at: Utc::now(),
            };
            inner.permissions.insert(key, def.clone());
            Ok(def)
        }

        async fn get_permission_definition(
            &self,
            entity_type: &str,
            permission_name: &str,
        ) -> Result<Option<PermissionDefinition>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .permissions
                .get(&(entity_type.to_string(), permission_name.to_string()))
                .cloned())
        }

        async fn list_permission_definitions(&self) -> Result<Vec<PermissionDefinition>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner.permissions.values().cloned().collect())
        }

        async fn add_rule(&self, rule: RuleDefinition) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            inner.rules.insert(rule.name.clone(), rule);
            Ok(())
        }

        async fn get_rule(&self, name: &str) -> Result<Option<RuleDefinition>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner.rules.get(name).cloned())
        }

        async fn entity_type_counts(&self) -> Result<Vec<EntityTypeCount>> {
            let inner = self.inner.lock().unwrap();
            let mut counts: HashMap<String, i64> = HashMap::new();
            for key in inner.entities.keys() {
                *counts.entry(key.0.clone()).or_default() += 1;
            }
            Ok(counts
                .into_iter()
                .map(|(entity_type, count)| EntityTypeCount { entity_type, count })
                .collect())
        }

        async fn list_relations(
            &self,
            entity_type: Option<&str>,
            relation: Option<&str>,
            limit: i64,
        ) -> Result<Vec<RelationEdge>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .relations
                .iter()
                .filter(|e| entity_type.is_none_or(|t| e.subject_type == t || e.object_type == t))
                .filter(|e| relation.is_none_or(|r| e.relation == r))
                .take(limit.max(0) as usize)
                .cloned()
                .collect())
        }

        async fn graph_bfs(
            &self,
            entity_type: &str,
            entity_id: &str,
            relation_type: Option<&str>,
            depth: usize,
        ) -> Result<Vec<GraphEdge>> {
            let inner = self.inner.lock().unwrap();
            let mut visited: HashSet<(String, String)> = HashSet::new();
            let start = (entity_type.to_string(), entity_id.to_string());
            visited.insert(start.clone());
            let mut frontier = vec![start];
            let mut out = Vec::new();

            for d in 0..depth {
                let mut next_frontier = Vec::new();
                for (t, id) in &frontier {
                    for edge in &inner.relations {
                        if let Some(rt) = relation_type {
                            if edge.relation != rt {
                                continue;
                            }
                        }
                        let (other_type, other_id, touches) = if &edge.subject_type == t && &edge.subject_id == id {
                            (edge.object_type.clone(), edge.object_id.clone(), true)
                        } else if &edge.object_type == t && &edge.object_id == id {
                            (edge.subject_type.clone(), edge.subject_id.clone(), true)
                        } else {
                            (String::new(), String::new(), false)
                        };
                        if !touches {
                            continue;
                        }
                        out.push(GraphEdge {
                            edge: edge.clone(),
                            depth: d,
                        });
                        let key = (other_type, other_id);
                        if visited.insert(key.clone()) {
                            next_frontier.push(key);
                        }
                    }
                }
                frontier = next_frontier;
            }
            Ok(out)
        }

        async fn load_current_model(&self) -> Result<Model> {
            let inner = self.inner.lock().unwrap();
            let mut entities: std::collections::BTreeMap<String, EntitySchema> = Default::default();
            for def in inner.permissions.values() {
                let schema = entities.entry(def.entity_type.clone()).or_insert_with(|| EntitySchema {
                    name: def.entity_type.clone(),
                    relations: Vec::new(),
                    attributes: Vec::new(),
                    permissions: Default::default(),
                });
                schema.permissions.insert(
                    def.permission_name.clone(),
                    crate::model::PermissionSource {
                        expression: def.condition_expression.clone(),
                        description: def.description.clone(),
                    },
                );
            }
            Ok(Model {
                entities,
                rules: inner.rules.clone().into_iter().collect(),
                source_file: inner.version.as_ref().map(|v| v.source_file.clone()),
            })
        }

        async fn apply_model(
            &self,
            entities: &[EntitySchema],
            rules: &[RuleDefinition],
            description: &str,
            source_file: &str,
        ) -> Result<ModelVersion> {
            let mut inner = self.inner.lock().unwrap();
            inner.permissions.clear();
            for schema in entities {
                for (name, src) in &schema.permissions {
                    inner.permissions.insert(
                        (schema.name.clone(), name.clone()),
                        PermissionDefinition {
                            entity_type: schema.name.clone(),
                            permission_name: name.clone(),
                            condition_expression: src.expression.clone(),
                            description: src.description.clone(),
                            created_at: Utc::now(),
                        },
                    );
                }
            }
            inner.rules.clear();
            for rule in rules {
                inner.rules.insert(rule.name.clone(), rule.clone());
            }
            let next_version = inner.version.as_ref().map(|v| v.version + 1).unwrap_or(1);
            let version = ModelVersion {
                version: next_version,
                description: description.into(),
                source_file: source_file.into(),
                applied_at: Utc::now(),
            };
            inner.version = Some(version.clone());
            Ok(version)
        }

        async fn current_version(&self) -> Result<Option<ModelVersion>> {
            Ok(self.inner.lock().unwrap().version.clone())
        }

        async fn append_migration_history(&self, entry: MigrationHistoryEntry) -> Result<()> {
            self.inner.lock().unwrap().history.push(entry);
            Ok(())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }
}
