// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! [`PgGraphStore`]: the PostgreSQL [`GraphStore`] implementation.
//!
//! Queries are built with plain `sqlx::query`/`query_as` and positional
//! binds, rather than the `query!` macros, so the crate compiles without a
//! live database at build time. Multi-pair frontier predicates
//! (the BFS traversal's bread and butter) go through [`crate::sql`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use permix_core::{
    error::{Error, Result},
    graph::{Direction, EntityTypeCount, GraphEdge, GraphStore},
    model::{Entity, EntitySchema, MigrationHistoryEntry, Model, ModelVersion, PermissionDefinition, RelationEdge, RuleDefinition},
};
use serde_json::Value as Json;
use sqlx::{postgres::{PgArguments, PgPool}, Arguments, Row};
use tokio::sync::RwLock;

use crate::{
    rows::{EntityRow, ModelVersionRow, PermissionDefinitionRow, RelationRow, RuleDefinitionRow},
    sql::{bind_pairs, pair_in_clause, Pair},
};

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn storage_err(context: &str, err: sqlx::Error) -> Error {
    Error::StorageFailure(format!("{context}: {err}"))
}

/// The PostgreSQL-backed identity graph and permission catalog store.
pub struct PgGraphStore {
    pool: PgPool,
    /// Process-wide rule cache, protected by a readers-writer lock.
    rule_cache: RwLock<HashMap<String, RuleDefinition>>,
}

impl PgGraphStore {
    /// Wrap an already-connected, already-migrated pool. Does not warm the
    /// rule cache; call [`PgGraphStore::warm_rule_cache`] after construction
    /// to have it reloaded on startup.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            rule_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Populate the rule cache from the catalog. Called once at startup and
    /// once more, best-effort, on a cache miss during evaluation.
    pub async fn warm_rule_cache(&self) -> Result<()> {
        let rows: Vec<RuleDefinitionRow> = sqlx::query_as("SELECT rule_name, parameters, expression, description FROM rule_definitions")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_err("loading rule cache", e))?;

        let mut fresh = HashMap::with_capacity(rows.len());
        for row in rows {
            let rule = RuleDefinition::try_from(row)?;
            fresh.insert(rule.name.clone(), rule);
        }

        let mut cache = self.rule_cache.write().await;
        *cache = fresh;
        Ok(())
    }

    // BFS seeded from `start`, hopping via `path_type` edges that touch the
    // current node on either side (a node can sit as the subject or the
    // object of its path edge), looking for a `relation_name` edge landing
    // on `goal` in either orientation too.
    async fn bfs_orientation(
        &self,
        start_type: &str,
        start_id: &str,
        path_type: &str,
        relation_name: &str,
        goal_type: &str,
        goal_id: &str,
        depth_cap: usize,
    ) -> Result<bool> {
        let mut visited: HashSet<Pair> = HashSet::new();
        let start = (start_type.to_string(), start_id.to_string());
        visited.insert(start.clone());
        let mut frontier = vec![start];

        for _ in 0..depth_cap {
            if frontier.is_empty() {
                break;
            }

            let (frontier_as_subject, next_idx) = pair_in_clause("subject_type", "subject_id", &frontier, 4);
            let (frontier_as_object, _) = pair_in_clause("object_type", "object_id", &frontier, next_idx);
            let hit_sql = format!(
                "SELECT 1 FROM relations WHERE relation = $1 \
                 AND (({frontier_as_subject} AND object_type = $2 AND object_id = $3) \
                      OR ({frontier_as_object} AND subject_type = $2 AND subject_id = $3)) \
                 LIMIT 1"
            );
            let mut hit_args = PgArguments::default();
            let _ = hit_args.add(relation_name.to_string());
            let _ = hit_args.add(goal_type.to_string());
            let _ = hit_args.add(goal_id.to_string());
            bind_pairs(&mut hit_args, &frontier);
            bind_pairs(&mut hit_args, &frontier);
            let found = sqlx::query_with(&hit_sql, hit_args)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| storage_err("indirect relation hop lookup", e))?;
            if found.is_some() {
                return Ok(true);
            }

            let (frontier_as_object2, next_idx2) = pair_in_clause("object_type", "object_id", &frontier, 2);
            let (frontier_as_subject2, _) = pair_in_clause("subject_type", "subject_id", &frontier, next_idx2);
            let hop_sql = format!(
                "SELECT DISTINCT subject_type AS node_type, subject_id AS node_id FROM relations \
                 WHERE relation = $1 AND {frontier_as_object2} \
                 UNION \
                 SELECT DISTINCT object_type AS node_type, object_id AS node_id FROM relations \
                 WHERE relation = $1 AND {frontier_as_subject2}"
            );
            let mut hop_args = PgArguments::default();
            let _ = hop_args.add(path_type.to_string());
            bind_pairs(&mut hop_args, &frontier);
            bind_pairs(&mut hop_args, &frontier);
            let hop_rows = sqlx::query_with(&hop_sql, hop_args)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| storage_err("indirect relation hop expansion", e))?;

            let mut next_frontier = Vec::new();
            for row in hop_rows {
                let t: String = row.try_get("node_type").map_err(|e| storage_err("reading hop row", e))?;
                let id: String = row.try_get("node_id").map_err(|e| storage_err("reading hop row", e))?;
                let key = (t, id);
                if visited.insert(key.clone()) {
                    next_frontier.push(key);
                }
            }
            frontier = next_frontier;
        }

        Ok(false)
    }
}

#[async_trait]
impl GraphStore for PgGraphStore {
    async fn create_entity(&self, type_: &str, external_id: &str, properties: Json) -> Result<Entity> {
        let row: Result<EntityRow, sqlx::Error> = sqlx::query_as(
            "INSERT INTO entities (type, external_id, properties, auto_created) VALUES ($1, $2, $3, false) \
             RETURNING type, external_id, properties, auto_created, created_at, updated_at",
        )
        .bind(type_)
        .bind(external_id)
        .bind(&properties)
        .fetch_one(&self.pool)
        .await;

        match row {
            Ok(row) => Ok(row.into()),
            Err(e) if is_unique_violation(&e) => Err(Error::EntityAlreadyExists {
                type_: type_.to_string(),
                external_id: external_id.to_string(),
            }),
            Err(e) => Err(storage_err("creating entity", e)),
        }
    }

    async fn get_entity(&self, type_: &str, external_id: &str) -> Result<Option<Entity>> {
        let row: Option<EntityRow> = sqlx::query_as(
            "SELECT type, external_id, properties, auto_created, created_at, updated_at FROM entities WHERE type = $1 AND external_id = $2",
        )
        .bind(type_)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("reading entity", e))?;
        Ok(row.map(Into::into))
    }

    async fn ensure_entity_stub(&self, type_: &str, external_id: &str) -> Result<Entity> {
        let row: EntityRow = sqlx::query_as(
            "INSERT INTO entities (type, external_id, properties, auto_created) VALUES ($1, $2, '{}'::jsonb, true) \
             ON CONFLICT (type, external_id) DO UPDATE SET type = entities.type \
             RETURNING type, external_id, properties, auto_created, created_at, updated_at",
        )
        .bind(type_)
        .bind(external_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("ensuring entity stub", e))?;

        if row.auto_created {
            tracing::warn!(entity.type = %type_, entity.external_id = %external_id, "auto-created stub entity; check for a typo in the relation's endpoint");
        }
        Ok(row.into())
    }

    async fn delete_entity(&self, type_: &str, external_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM entities WHERE type = $1 AND external_id = $2")
            .bind(type_)
            .bind(external_id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("deleting entity", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_relation(
        &self,
        subject_type: &str,
        subject_id: &str,
        relation: &str,
        object_type: &str,
        object_id: &str,
    ) -> Result<RelationEdge> {
        self.ensure_entity_stub(subject_type, subject_id).await?;
        self.ensure_entity_stub(object_type, object_id).await?;

        let row: RelationRow = sqlx::query_as(
            "INSERT INTO relations (subject_type, subject_id, relation, object_type, object_id) VALUES ($1, $2, $3, $4, $5) \
             RETURNING subject_type, subject_id, relation, object_type, object_id, created_at",
        )
        .bind(subject_type)
        .bind(subject_id)
        .bind(relation)
        .bind(object_type)
        .bind(object_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_err("creating relation", e))?;
        Ok(row.into())
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
        const SQL: &str = "SELECT EXISTS(SELECT 1 FROM relations WHERE subject_type = $1 AND subject_id = $2 AND relation = $3 AND object_type = $4 AND object_id = $5)";

        let check = |st: &str, si: &str, ot: &str, oi: &str| {
            sqlx::query_scalar::<_, bool>(SQL)
                .bind(st.to_string())
                .bind(si.to_string())
                .bind(relation.to_string())
                .bind(ot.to_string())
                .bind(oi.to_string())
        };

        match direction {
            Direction::Normal => check(subject_type, subject_id, object_type, object_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| storage_err("checking direct relation", e)),
            Direction::Reverse => check(object_type, object_id, subject_type, subject_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| storage_err("checking direct relation", e)),
            Direction::Both => {
                let forward = check(subject_type, subject_id, object_type, object_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| storage_err("checking direct relation", e))?;
                if forward {
                    return Ok(true);
                }
                check(object_type, object_id, subject_type, subject_id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| storage_err("checking direct relation", e))
            }
        }
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
        let forward = self
            .bfs_orientation(object_type, object_id, path_type, relation_name, subject_type, subject_id, depth_cap)
            .await?;
        if forward {
            return Ok(true);
        }
        self.bfs_orientation(subject_type, subject_id, path_type, relation_name, object_type, object_id, depth_cap)
            .await
    }

    async fn get_entity_attribute(&self, entity_type: &str, external_id: &str, attribute_name: &str) -> Result<Option<Json>> {
        let entity = self.get_entity(entity_type, external_id).await?;
        Ok(entity.and_then(|e| e.attribute(attribute_name).cloned()))
    }

    async fn add_permission_definition(
        &self,
        entity_type: &str,
        permission_name: &str,
        condition_expression: &str,
        description: Option<&str>,
    ) -> Result<PermissionDefinition> {
        let row: std::result::Result<PermissionDefinitionRow, sqlx::Error> = sqlx::query_as(
            "INSERT INTO permission_definitions (entity_type, permission_name, condition_expression, description) \
             VALUES ($1, $2, $3, $4) \
             RETURNING entity_type, permission_name, condition_expression, description, created_at",
        )
        .bind(entity_type)
        .bind(permission_name)
        .bind(condition_expression)
        .bind(description)
        .fetch_one(&self.pool)
        .await;

        match row {
            Ok(row) => Ok(row.into()),
            Err(e) if is_unique_violation(&e) => Err(Error::InvalidRequest(format!(
                "permission already defined: {entity_type}.{permission_name}"
            ))),
            Err(e) => Err(storage_err("creating permission definition", e)),
        }
    }

    async fn get_permission_definition(&self, entity_type: &str, permission_name: &str) -> Result<Option<PermissionDefinition>> {
        let row: Option<PermissionDefinitionRow> = sqlx::query_as(
            "SELECT entity_type, permission_name, condition_expression, description, created_at \
             FROM permission_definitions WHERE entity_type = $1 AND permission_name = $2",
        )
        .bind(entity_type)
        .bind(permission_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_err("reading permission definition", e))?;
        Ok(row.map(Into::into))
    }

    async fn list_permission_definitions(&self) -> Result<Vec<PermissionDefinition>> {
        let rows: Vec<PermissionDefinitionRow> = sqlx::query_as(
            "SELECT entity_type, permission_name, condition_expression, description, created_at \
             FROM permission_definitions ORDER BY entity_type, permission_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("listing permission definitions", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn add_rule(&self, rule: RuleDefinition) -> Result<()> {
        let parameters = serde_json::to_value(&rule.parameters).map_err(|e| Error::Internal(format!("serializing rule parameters: {e}")))?;
        sqlx::query(
            "INSERT INTO rule_definitions (rule_name, parameters, expression, description) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (rule_name) DO UPDATE SET parameters = EXCLUDED.parameters, expression = EXCLUDED.expression, description = EXCLUDED.description",
        )
        .bind(&rule.name)
        .bind(parameters)
        .bind(&rule.expression)
        .bind(&rule.description)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err("persisting rule", e))?;

        self.rule_cache.write().await.insert(rule.name.clone(), rule);
        Ok(())
    }

    async fn get_rule(&self, name: &str) -> Result<Option<RuleDefinition>> {
        if let Some(rule) = self.rule_cache.read().await.get(name).cloned() {
            return Ok(Some(rule));
        }
        // One-shot reload before giving up.
        self.warm_rule_cache().await?;
        Ok(self.rule_cache.read().await.get(name).cloned())
    }

    async fn entity_type_counts(&self) -> Result<Vec<EntityTypeCount>> {
        let rows = sqlx::query("SELECT type, COUNT(*) AS count FROM entities GROUP BY type ORDER BY type")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_err("counting entity types", e))?;
        rows.into_iter()
            .map(|row| {
                let entity_type: String = row.try_get("type").map_err(|e| storage_err("reading entity type count", e))?;
                let count: i64 = row.try_get("count").map_err(|e| storage_err("reading entity type count", e))?;
                Ok(EntityTypeCount { entity_type, count })
            })
            .collect()
    }

    async fn list_relations(&self, entity_type: Option<&str>, relation: Option<&str>, limit: i64) -> Result<Vec<RelationEdge>> {
        let rows: Vec<RelationRow> = sqlx::query_as(
            "SELECT subject_type, subject_id, relation, object_type, object_id, created_at FROM relations \
             WHERE ($1::text IS NULL OR subject_type = $1 OR object_type = $1) \
               AND ($2::text IS NULL OR relation = $2) \
             ORDER BY created_at DESC LIMIT $3",
        )
        .bind(entity_type)
        .bind(relation)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_err("listing relations", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn graph_bfs(&self, entity_type: &str, entity_id: &str, relation_type: Option<&str>, depth: usize) -> Result<Vec<GraphEdge>> {
        let mut visited: HashSet<Pair> = HashSet::new();
        let start = (entity_type.to_string(), entity_id.to_string());
        visited.insert(start.clone());
        let mut frontier = vec![start];
        let mut out = Vec::new();

        for d in 0..depth {
            if frontier.is_empty() {
                break;
            }

            let (subject_clause, next_idx) = pair_in_clause("subject_type", "subject_id", &frontier, 2);
            let (object_clause, _) = pair_in_clause("object_type", "object_id", &frontier, next_idx);
            let sql = format!(
                "SELECT subject_type, subject_id, relation, object_type, object_id, created_at FROM relations \
                 WHERE ({subject_clause} OR {object_clause}) AND ($1::text IS NULL OR relation = $1)"
            );

            let mut args = PgArguments::default();
            let _ = args.add(relation_type.map(|s| s.to_string()));
            bind_pairs(&mut args, &frontier);
            bind_pairs(&mut args, &frontier);

            let rows = sqlx::query_as_with::<_, RelationRow, _>(&sql, args)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| storage_err("walking graph", e))?;

            let mut next_frontier = Vec::new();
            for row in rows {
                let edge: RelationEdge = row.into();
                let touches_subject = frontier.iter().any(|(t, id)| *t == edge.subject_type && *id == edge.subject_id);
                let other = if touches_subject {
                    (edge.object_type.clone(), edge.object_id.clone())
                } else {
                    (edge.subject_type.clone(), edge.subject_id.clone())
                };
                out.push(GraphEdge { edge, depth: d });
                if visited.insert(other.clone()) {
                    next_frontier.push(other);
                }
            }
            frontier = next_frontier;
        }

        Ok(out)
    }

    async fn load_current_model(&self) -> Result<Model> {
        let permissions = self.list_permission_definitions().await?;
        let rule_rows: Vec<RuleDefinitionRow> = sqlx::query_as("SELECT rule_name, parameters, expression, description FROM rule_definitions")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_err("loading current model's rules", e))?;

        let mut entities: std::collections::BTreeMap<String, EntitySchema> = Default::default();
        for def in permissions {
            let schema = entities.entry(def.entity_type.clone()).or_insert_with(|| EntitySchema {
                name: def.entity_type.clone(),
                relations: Vec::new(),
                attributes: Vec::new(),
                permissions: Default::default(),
            });
            schema.permissions.insert(
                def.permission_name.clone(),
                permix_core::model::PermissionSource {
                    expression: def.condition_expression.clone(),
                    description: def.description.clone(),
                },
            );
        }

        let mut rules = std::collections::BTreeMap::new();
        for row in rule_rows {
            let rule = RuleDefinition::try_from(row)?;
            rules.insert(rule.name.clone(), rule);
        }

        let source_file = self.current_version().await?.map(|v| v.source_file);
        Ok(Model {
            entities,
            rules,
            source_file,
        })
    }

    async fn apply_model(&self, entities: &[EntitySchema], rules: &[RuleDefinition], description: &str, source_file: &str) -> Result<ModelVersion> {
        let mut tx = self.pool.begin().await.map_err(|e| storage_err("starting apply transaction", e))?;

        sqlx::query("DELETE FROM permission_definitions")
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_err("clearing permission definitions", e))?;
        for schema in entities {
            for (name, source) in &schema.permissions {
                sqlx::query(
                    "INSERT INTO permission_definitions (entity_type, permission_name, condition_expression, description) VALUES ($1, $2, $3, $4)",
                )
                .bind(&schema.name)
                .bind(name)
                .bind(&source.expression)
                .bind(&source.description)
                .execute(&mut *tx)
                .await
                .map_err(|e| storage_err("inserting permission definition", e))?;
            }
        }

        sqlx::query("DELETE FROM rule_definitions")
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_err("clearing rule definitions", e))?;
        for rule in rules {
            let parameters = serde_json::to_value(&rule.parameters).map_err(|e| Error::Internal(format!("serializing rule parameters: {e}")))?;
            sqlx::query("INSERT INTO rule_definitions (rule_name, parameters, expression, description) VALUES ($1, $2, $3, $4)")
                .bind(&rule.name)
                .bind(parameters)
                .bind(&rule.expression)
                .bind(&rule.description)
                .execute(&mut *tx)
                .await
                .map_err(|e| storage_err("inserting rule definition", e))?;
        }

        let current_version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM permission_versions")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| storage_err("reading current version", e))?;
        let next_version = current_version.unwrap_or(0) + 1;

        let version_row: ModelVersionRow = sqlx::query_as(
            "INSERT INTO permission_versions (version, description, source_file) VALUES ($1, $2, $3) \
             RETURNING version, description, source_file, applied_at",
        )
        .bind(next_version)
        .bind(description)
        .bind(source_file)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| storage_err("inserting model version", e))?;

        tx.commit().await.map_err(|e| storage_err("committing apply transaction", e))?;

        let mut cache = self.rule_cache.write().await;
        cache.clear();
        for rule in rules {
            cache.insert(rule.name.clone(), rule.clone());
        }
        drop(cache);

        Ok(version_row.into())
    }

    async fn current_version(&self) -> Result<Option<ModelVersion>> {
        let row: Option<ModelVersionRow> =
            sqlx::query_as("SELECT version, description, source_file, applied_at FROM permission_versions ORDER BY version DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| storage_err("reading current version", e))?;
        Ok(row.map(Into::into))
    }

    async fn append_migration_history(&self, entry: MigrationHistoryEntry) -> Result<()> {
        sqlx::query("INSERT INTO migration_history (version, success, errors, diff, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(entry.version)
            .bind(entry.success)
            .bind(&entry.error)
            .bind(&entry.diff)
            .bind(entry.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_err("appending migration history", e))?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage_err("pinging catalog database", e))?;
        Ok(())
    }
}
