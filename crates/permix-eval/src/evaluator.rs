// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! The condition evaluator.
//!
//! [`Evaluator::check`] is the single entry point used by the HTTP decision
//! handler: given a stored condition expression string, a subject, an
//! object, and a request context, it parses the expression and evaluates it
//! to a boolean, dispatching relation lookups and rule invocations against
//! a [`GraphStore`].

use std::{collections::HashMap, sync::atomic::{AtomicUsize, Ordering}};

use permix_core::{
    error::{Error, Result},
    graph::{Direction, GraphStore},
    value::{walk_path, PathLookup},
    Value,
};

use crate::{
    ast::{CompareOp, Expr, Literal},
    parser::parse,
};

/// How many recursive-traversal hops [`GraphStore::check_indirect_relation`]
/// is allowed to take.
pub const RELATION_DEPTH_CAP: usize = 10;

/// How many nested rule invocations are permitted before evaluation fails.
pub const RULE_DEPTH_CAP: usize = 32;

/// Evaluates condition expressions against a [`GraphStore`].
pub struct Evaluator<'a> {
    store: &'a dyn GraphStore,
    /// Number of `Call` nodes evaluated so far, exposed for tests that want
    /// to assert on invocation counts.
    pub rule_invocations: AtomicUsize,
}

struct Scope<'a> {
    subject_type: &'a str,
    subject_id: &'a str,
    object_type: &'a str,
    object_id: &'a str,
    context: &'a serde_json::Value,
    params: Option<&'a HashMap<String, Value>>,
    rule_depth: usize,
}

impl<'a> Evaluator<'a> {
    /// Construct an evaluator over `store`.
    pub fn new(store: &'a dyn GraphStore) -> Self {
        Self {
            store,
            rule_invocations: AtomicUsize::new(0),
        }
    }

    /// Parse `condition` and evaluate it for `(subject, object, context)`.
    ///
    /// This is the top-level contract the HTTP `/check` handler calls; it
    /// never returns `Ok(true)` paired with a pending error — the caller
    /// must treat any `Err` here as a non-decision.
    pub async fn check(
        &self,
        condition: &str,
        subject_type: &str,
        subject_id: &str,
        object_type: &str,
        object_id: &str,
        context: &serde_json::Value,
    ) -> Result<bool> {
        let expr = parse(condition).map_err(|e| Error::ConditionParseFailure(e.to_string()))?;
        let scope = Scope {
            subject_type,
            subject_id,
            object_type,
            object_id,
            context,
            params: None,
            rule_depth: 0,
        };
        self.eval_bool(&expr, &scope).await
    }

    fn eval_bool<'b>(&'b self, expr: &'b Expr, scope: &'b Scope<'b>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<bool>> + 'b>> {
        Box::pin(async move {
            match expr {
                Expr::And(left, right) => {
                    if !self.eval_bool(left, scope).await? {
                        return Ok(false);
                    }
                    self.eval_bool(right, scope).await
                }
                Expr::Or(left, right) => {
                    if self.eval_bool(left, scope).await? {
                        return Ok(true);
                    }
                    self.eval_bool(right, scope).await
                }
                Expr::Relation { path, name } => {
                    if path.is_empty() {
                        if let Some(value) = scope.params.and_then(|p| p.get(name)) {
                            return Ok(value.is_truthy());
                        }
                        self.store
                            .check_direct_relation(
                                scope.subject_type,
                                scope.subject_id,
                                name,
                                scope.object_type,
                                scope.object_id,
                                Direction::Both,
                            )
                            .await
                    } else {
                        self.store
                            .check_indirect_relation(
                                scope.subject_type,
                                scope.subject_id,
                                path,
                                name,
                                scope.object_type,
                                scope.object_id,
                                RELATION_DEPTH_CAP,
                            )
                            .await
                    }
                }
                Expr::Context { path } => {
                    if path.len() == 1 {
                        if let Some(value) = scope.params.and_then(|p| p.get(&path[0])) {
                            return Ok(value.is_truthy());
                        }
                    }
                    match walk_path(scope.context, path) {
                        PathLookup::Found(_) => Ok(true),
                        PathLookup::MissingLeaf => Ok(false),
                        PathLookup::MissingIntermediate => Err(Error::EvaluationFailure(format!(
                            "context path '{}' has a missing intermediate segment",
                            path.join(".")
                        ))),
                    }
                }
                Expr::Call { name, args } => self.eval_call(name, args, scope).await,
                Expr::Comparison { left, op, right } => {
                    let l = self.eval_value(left, scope).await?;
                    let r = self.eval_value(right, scope).await?;
                    compare(&l, *op, &r)
                }
                Expr::Literal(lit) => Ok(literal_to_value(lit).is_truthy()),
            }
        })
    }

    fn eval_value<'b>(&'b self, expr: &'b Expr, scope: &'b Scope<'b>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Value>> + 'b>> {
        Box::pin(async move {
            match expr {
                Expr::Relation { path, name } if path.is_empty() => {
                    if let Some(value) = scope.params.and_then(|p| p.get(name)) {
                        return Ok(value.clone());
                    }
                    let raw = self
                        .store
                        .get_entity_attribute(scope.object_type, scope.object_id, name)
                        .await?;
                    Ok(raw.map(Value::from).unwrap_or(Value::Null))
                }
                Expr::Context { path } => {
                    if path.len() == 1 {
                        if let Some(value) = scope.params.and_then(|p| p.get(&path[0])) {
                            return Ok(value.clone());
                        }
                    }
                    match walk_path(scope.context, path) {
                        PathLookup::Found(v) => Ok(Value::from(v)),
                        PathLookup::MissingLeaf => Ok(Value::Null),
                        PathLookup::MissingIntermediate => Err(Error::EvaluationFailure(format!(
                            "context path '{}' has a missing intermediate segment",
                            path.join(".")
                        ))),
                    }
                }
                Expr::Literal(lit) => Ok(literal_to_value(lit)),
                other => Ok(Value::Bool(self.eval_bool(other, scope).await?)),
            }
        })
    }

    async fn eval_call(&self, name: &str, args: &[Expr], scope: &Scope<'_>) -> Result<bool> {
        self.rule_invocations.fetch_add(1, Ordering::SeqCst);

        if scope.rule_depth + 1 > RULE_DEPTH_CAP {
            return Err(Error::EvaluationFailure(format!(
                "rule recursion depth exceeded calling '{name}' (cap {RULE_DEPTH_CAP})"
            )));
        }

        let rule = self
            .store
            .get_rule(name)
            .await?
            .ok_or_else(|| Error::RuleNotFound(name.to_string()))?;

        if args.len() != rule.parameters.len() {
            return Err(Error::EvaluationFailure(format!(
                "rule '{name}' expects {} argument(s), got {}",
                rule.parameters.len(),
                args.len()
            )));
        }

        let mut bound = HashMap::with_capacity(args.len());
        for (param, arg) in rule.parameters.iter().zip(args) {
            let value = self.eval_value(arg, scope).await?;
            bound.insert(param.name.clone(), value);
        }

        let body = parse(&rule.expression).map_err(|e| Error::ConditionParseFailure(e.to_string()))?;
        let inner_scope = Scope {
            subject_type: scope.subject_type,
            subject_id: scope.subject_id,
            object_type: scope.object_type,
            object_id: scope.object_id,
            context: scope.context,
            params: Some(&bound),
            rule_depth: scope.rule_depth + 1,
        };
        self.eval_bool(&body, &inner_scope).await
    }
}

fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(n) => Value::Float(*n),
        Literal::Str(s) => Value::String(s.clone()),
    }
}

/// Compare two value-position results via a coercion ladder: numeric if
/// both coerce to `f64`, else lexicographic if both are strings, else only
/// equality/inequality via structural comparison.
fn compare(left: &Value, op: CompareOp, right: &Value) -> Result<bool> {
    if let (Some(l), Some(r)) = (left.to_number(), right.to_number()) {
        return Ok(match op {
            CompareOp::Eq => l == r,
            CompareOp::Neq => l != r,
            CompareOp::Gt => l > r,
            CompareOp::Gte => l >= r,
            CompareOp::Lt => l < r,
            CompareOp::Lte => l <= r,
        });
    }
    if let (Some(l), Some(r)) = (left.as_str(), right.as_str()) {
        return Ok(match op {
            CompareOp::Eq => l == r,
            CompareOp::Neq => l != r,
            CompareOp::Gt => l > r,
            CompareOp::Gte => l >= r,
            CompareOp::Lt => l < r,
            CompareOp::Lte => l <= r,
        });
    }
    match op {
        CompareOp::Eq => Ok(left.structurally_equal(right)),
        CompareOp::Neq => Ok(!left.structurally_equal(right)),
        _ => Err(Error::EvaluationFailure(format!(
            "cannot apply '{op}' to incompatible operand types"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use permix_core::{
        graph::{fake::FakeGraphStore, EntityTypeCount, GraphEdge},
        model::{Entity, EntitySchema, MigrationHistoryEntry, Model, ModelVersion, PermissionDefinition, RelationEdge, RuleDefinition, RuleParameter, AttributeDataType, ScalarType},
    };
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn direct_relation_grants_owner_and_denies_others() {
        let store = FakeGraphStore::new();
        store.create_relation("user", "alice", "owner", "document", "doc1").await.unwrap();
        let evaluator = Evaluator::new(&store);

        assert!(evaluator
            .check("owner", "user", "alice", "document", "doc1", &json!({}))
            .await
            .unwrap());
        assert!(!evaluator
            .check("owner", "user", "bob", "document", "doc1", &json!({}))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn indirect_relation_via_organization_admin() {
        let store = FakeGraphStore::new();
        store.create_relation("user", "carol", "admin", "organization", "acme").await.unwrap();
        store.create_relation("project", "p1", "org", "organization", "acme").await.unwrap();
        let evaluator = Evaluator::new(&store);

        assert!(evaluator
            .check("org.admin", "user", "carol", "project", "p1", &json!({}))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn rule_with_context_and_attribute_argument() {
        let store = FakeGraphStore::new();
        store.create_entity("account", "a1", json!({"cap": 100})).await.unwrap();
        store
            .add_rule(RuleDefinition {
                name: "under_limit".into(),
                parameters: vec![
                    RuleParameter { name: "amount".into(), data_type: AttributeDataType::scalar(ScalarType::Double) },
                    RuleParameter { name: "cap".into(), data_type: AttributeDataType::scalar(ScalarType::Double) },
                ],
                expression: "amount <= cap".into(),
                description: None,
            })
            .await
            .unwrap();
        let evaluator = Evaluator::new(&store);

        assert!(evaluator
            .check(
                "under_limit(request.amount, cap)",
                "user",
                "dave",
                "account",
                "a1",
                &json!({"amount": 50}),
            )
            .await
            .unwrap());
        assert!(!evaluator
            .check(
                "under_limit(request.amount, cap)",
                "user",
                "dave",
                "account",
                "a1",
                &json!({"amount": 150}),
            )
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn missing_permission_definition_is_a_caller_concern_not_evaluator() {
        // The evaluator only parses/evaluates an already-resolved condition
        // string; `permission_definition_not_found` is raised by the HTTP
        // handler before the evaluator is ever invoked.
        let store = FakeGraphStore::new();
        let evaluator = Evaluator::new(&store);
        let err = evaluator
            .check("nonexistent_rule(request.x)", "user", "u", "document", "d", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "rule_not_found");
    }

    struct CountingStore {
        inner: FakeGraphStore,
        right_side_checks: AtomicUsize,
    }

    #[async_trait]
    impl GraphStore for CountingStore {
        async fn create_entity(&self, t: &str, id: &str, p: serde_json::Value) -> Result<Entity> {
            self.inner.create_entity(t, id, p).await
        }
        async fn get_entity(&self, t: &str, id: &str) -> Result<Option<Entity>> {
            self.inner.get_entity(t, id).await
        }
        async fn ensure_entity_stub(&self, t: &str, id: &str) -> Result<Entity> {
            self.inner.ensure_entity_stub(t, id).await
        }
        async fn delete_entity(&self, t: &str, id: &str) -> Result<bool> {
            self.inner.delete_entity(t, id).await
        }
        async fn create_relation(&self, st: &str, si: &str, r: &str, ot: &str, oi: &str) -> Result<RelationEdge> {
            self.inner.create_relation(st, si, r, ot, oi).await
        }
        async fn check_direct_relation(
            &self,
            st: &str,
            si: &str,
            r: &str,
            ot: &str,
            oi: &str,
            d: Direction,
        ) -> Result<bool> {
            if r == "right_side" {
                self.right_side_checks.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.check_direct_relation(st, si, r, ot, oi, d).await
        }
        async fn check_indirect_relation(
            &self,
            st: &str,
            si: &str,
            pt: &str,
            rn: &str,
            ot: &str,
            oi: &str,
            cap: usize,
        ) -> Result<bool> {
            self.inner.check_indirect_relation(st, si, pt, rn, ot, oi, cap).await
        }
        async fn get_entity_attribute(&self, t: &str, id: &str, a: &str) -> Result<Option<serde_json::Value>> {
            self.inner.get_entity_attribute(t, id, a).await
        }
        async fn add_permission_definition(
            &self,
            t: &str,
            p: &str,
            e: &str,
            d: Option<&str>,
        ) -> Result<PermissionDefinition> {
            self.inner.add_permission_definition(t, p, e, d).await
        }
        async fn get_permission_definition(&self, t: &str, p: &str) -> Result<Option<PermissionDefinition>> {
            self.inner.get_permission_definition(t, p).await
        }
        async fn list_permission_definitions(&self) -> Result<Vec<PermissionDefinition>> {
            self.inner.list_permission_definitions().await
        }
        async fn add_rule(&self, r: RuleDefinition) -> Result<()> {
            self.inner.add_rule(r).await
        }
        async fn get_rule(&self, n: &str) -> Result<Option<RuleDefinition>> {
            self.inner.get_rule(n).await
        }
        async fn entity_type_counts(&self) -> Result<Vec<EntityTypeCount>> {
            self.inner.entity_type_counts().await
        }
        async fn list_relations(&self, t: Option<&str>, r: Option<&str>, l: i64) -> Result<Vec<RelationEdge>> {
            self.inner.list_relations(t, r, l).await
        }
        async fn graph_bfs(&self, t: &str, id: &str, r: Option<&str>, d: usize) -> Result<Vec<GraphEdge>> {
            self.inner.graph_bfs(t, id, r, d).await
        }
        async fn load_current_model(&self) -> Result<Model> {
            self.inner.load_current_model().await
        }
        async fn apply_model(&self, e: &[EntitySchema], r: &[RuleDefinition], desc: &str, sf: &str) -> Result<ModelVersion> {
            self.inner.apply_model(e, r, desc, sf).await
        }
        async fn current_version(&self) -> Result<Option<ModelVersion>> {
            self.inner.current_version().await
        }
        async fn append_migration_history(&self, e: MigrationHistoryEntry) -> Result<()> {
            self.inner.append_migration_history(e).await
        }
        async fn ping(&self) -> Result<()> {
            self.inner.ping().await
        }
    }

    #[tokio::test]
    async fn and_short_circuits_without_touching_right_operand() {
        let store = CountingStore {
            inner: FakeGraphStore::new(),
            right_side_checks: AtomicUsize::new(0),
        };
        // `left_side` is never created as a relation, so it's false; `and`
        // must not evaluate `right_side` at all.
        let evaluator = Evaluator::new(&store);
        let allowed = evaluator
            .check("left_side and right_side", "user", "u", "document", "d", &json!({}))
            .await
            .unwrap();
        assert!(!allowed);
        assert_eq!(store.right_side_checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn or_short_circuits_once_left_is_true() {
        let store = CountingStore {
            inner: FakeGraphStore::new(),
            right_side_checks: AtomicUsize::new(0),
        };
        store.inner.create_relation("user", "u", "left_side", "document", "d").await.unwrap();
        let evaluator = Evaluator::new(&store);
        let allowed = evaluator
            .check("left_side or right_side", "user", "u", "document", "d", &json!({}))
            .await
            .unwrap();
        assert!(allowed);
        assert_eq!(store.right_side_checks.load(Ordering::SeqCst), 0);
    }
}
