// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Model diff algorithm.
//!
//! Compares two parsed [`Model`]s and reports everything the migrator needs
//! to replace: added/removed entity types, added/removed/modified
//! permissions per entity, and added/removed/modified rules (including
//! per-parameter changes).

use std::collections::BTreeSet;

use permix_core::model::{Model, RuleParameter};

/// A modified permission: same name, different expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedPermission {
    /// Permission name.
    pub name: String,
    /// Expression as it was in the old model.
    pub old_expression: String,
    /// Expression as it is in the new model.
    pub new_expression: String,
}

/// Permission-level changes scoped to one entity type present in both
/// models.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityDiff {
    /// Permission names present only in the new model.
    pub added_permissions: Vec<String>,
    /// Permission names present only in the old model.
    pub removed_permissions: Vec<String>,
    /// Permissions present in both with a changed expression.
    pub modified_permissions: Vec<ModifiedPermission>,
}

impl EntityDiff {
    /// Whether this entity has no permission-level changes.
    pub fn is_empty(&self) -> bool {
        self.added_permissions.is_empty() && self.removed_permissions.is_empty() && self.modified_permissions.is_empty()
    }
}

/// A rule whose expression and/or parameter list changed between models.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedRule {
    /// Rule name.
    pub name: String,
    /// Whether the body expression text differs.
    pub expression_changed: bool,
    /// Parameters present only in the new rule.
    pub added_parameters: Vec<RuleParameter>,
    /// Parameters present only in the old rule.
    pub removed_parameters: Vec<RuleParameter>,
    /// Parameters present in both by name, with a changed data type.
    pub modified_parameters: Vec<String>,
}

/// The full diff between two models.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelDiff {
    /// Entity types only in the new model.
    pub added_entities: Vec<String>,
    /// Entity types only in the old model.
    pub removed_entities: Vec<String>,
    /// Per-entity permission diffs, for entity types present in both models
    /// with at least one change.
    pub changed_entities: Vec<(String, EntityDiff)>,
    /// Rule names only in the new model.
    pub added_rules: Vec<String>,
    /// Rule names only in the old model.
    pub removed_rules: Vec<String>,
    /// Rules present in both models with a changed expression or
    /// parameter list.
    pub modified_rules: Vec<ModifiedRule>,
}

impl ModelDiff {
    /// `diff(A, B).is_empty()` holds exactly when `A` and `B` are
    /// equivalent at the fields this diff tracks.
    pub fn is_empty(&self) -> bool {
        self.added_entities.is_empty()
            && self.removed_entities.is_empty()
            && self.changed_entities.is_empty()
            && self.added_rules.is_empty()
            && self.removed_rules.is_empty()
            && self.modified_rules.is_empty()
    }

    /// Render a short human-readable description, stored verbatim as the
    /// `migration_history.diff` text.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return "no changes".to_string();
        }
        let mut lines = Vec::new();
        for e in &self.added_entities {
            lines.push(format!("+ entity {e}"));
        }
        for e in &self.removed_entities {
            lines.push(format!("- entity {e}"));
        }
        for (entity, diff) in &self.changed_entities {
            for p in &diff.added_permissions {
                lines.push(format!("+ {entity}.{p}"));
            }
            for p in &diff.removed_permissions {
                lines.push(format!("- {entity}.{p}"));
            }
            for m in &diff.modified_permissions {
                lines.push(format!(
                    "~ {entity}.{} : \"{}\" -> \"{}\"",
                    m.name, m.old_expression, m.new_expression
                ));
            }
        }
        for r in &self.added_rules {
            lines.push(format!("+ rule {r}"));
        }
        for r in &self.removed_rules {
            lines.push(format!("- rule {r}"));
        }
        for r in &self.modified_rules {
            lines.push(format!("~ rule {}", r.name));
        }
        lines.join("\n")
    }
}

/// Compute the diff of `new_model` against `old_model`.
pub fn diff(old_model: &Model, new_model: &Model) -> ModelDiff {
    let old_entity_names: BTreeSet<&String> = old_model.entities.keys().collect();
    let new_entity_names: BTreeSet<&String> = new_model.entities.keys().collect();

    let added_entities: Vec<String> = new_entity_names
        .difference(&old_entity_names)
        .map(|s| s.to_string())
        .collect();
    let removed_entities: Vec<String> = old_entity_names
        .difference(&new_entity_names)
        .map(|s| s.to_string())
        .collect();

    let mut changed_entities = Vec::new();
    for name in old_entity_names.intersection(&new_entity_names) {
        let old_schema = &old_model.entities[*name];
        let new_schema = &new_model.entities[*name];

        let old_perms: BTreeSet<&String> = old_schema.permissions.keys().collect();
        let new_perms: BTreeSet<&String> = new_schema.permissions.keys().collect();

        let added_permissions: Vec<String> = new_perms.difference(&old_perms).map(|s| s.to_string()).collect();
        let removed_permissions: Vec<String> = old_perms.difference(&new_perms).map(|s| s.to_string()).collect();
        let modified_permissions: Vec<ModifiedPermission> = old_perms
            .intersection(&new_perms)
            .filter_map(|perm_name| {
                let old_expr = &old_schema.permissions[*perm_name].expression;
                let new_expr = &new_schema.permissions[*perm_name].expression;
                (old_expr != new_expr).then(|| ModifiedPermission {
                    name: perm_name.to_string(),
                    old_expression: old_expr.clone(),
                    new_expression: new_expr.clone(),
                })
            })
            .collect();

        let entity_diff = EntityDiff {
            added_permissions,
            removed_permissions,
            modified_permissions,
        };
        if !entity_diff.is_empty() {
            changed_entities.push((name.to_string(), entity_diff));
        }
    }

    let old_rule_names: BTreeSet<&String> = old_model.rules.keys().collect();
    let new_rule_names: BTreeSet<&String> = new_model.rules.keys().collect();

    let added_rules: Vec<String> = new_rule_names.difference(&old_rule_names).map(|s| s.to_string()).collect();
    let removed_rules: Vec<String> = old_rule_names.difference(&new_rule_names).map(|s| s.to_string()).collect();

    let mut modified_rules = Vec::new();
    for name in old_rule_names.intersection(&new_rule_names) {
        let old_rule = &old_model.rules[*name];
        let new_rule = &new_model.rules[*name];

        let old_params: BTreeSet<&str> = old_rule.parameters.iter().map(|p| p.name.as_str()).collect();
        let new_params: BTreeSet<&str> = new_rule.parameters.iter().map(|p| p.name.as_str()).collect();

        let added_parameters: Vec<RuleParameter> = new_rule
            .parameters
            .iter()
            .filter(|p| !old_params.contains(p.name.as_str()))
            .cloned()
            .collect();
        let removed_parameters: Vec<RuleParameter> = old_rule
            .parameters
            .iter()
            .filter(|p| !new_params.contains(p.name.as_str()))
            .cloned()
            .collect();
        let modified_parameters: Vec<String> = old_rule
            .parameters
            .iter()
            .filter_map(|op| {
                new_rule
                    .parameters
                    .iter()
                    .find(|np| np.name == op.name)
                    .filter(|np| np.data_type != op.data_type)
                    .map(|_| op.name.clone())
            })
            .collect();

        let expression_changed = old_rule.expression != new_rule.expression;
        if expression_changed || !added_parameters.is_empty() || !removed_parameters.is_empty() || !modified_parameters.is_empty() {
            modified_rules.push(ModifiedRule {
                name: name.to_string(),
                expression_changed,
                added_parameters,
                removed_parameters,
                modified_parameters,
            });
        }
    }

    ModelDiff {
        added_entities,
        removed_entities,
        changed_entities,
        added_rules,
        removed_rules,
        modified_rules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;

    #[test]
    fn identical_models_diff_to_empty() {
        let src = "entity document {\n  relation owner @user\n  permission read = owner\n}";
        let (m1, _) = parse_file(src, None);
        let (m2, _) = parse_file(src, None);
        let d = diff(&m1.unwrap(), &m2.unwrap());
        assert!(d.is_empty());
        assert_eq!(d.render(), "no changes");
    }

    #[test]
    fn modified_permission_is_reported_as_s5_describes() {
        let old = "entity document {\n  permission read = owner\n}";
        let new = "entity document {\n  permission read = owner or viewer\n}";
        let (old_model, _) = parse_file(old, None);
        let (new_model, _) = parse_file(new, None);
        let d = diff(&old_model.unwrap(), &new_model.unwrap());
        assert!(!d.is_empty());
        let (entity, entity_diff) = &d.changed_entities[0];
        assert_eq!(entity, "document");
        assert_eq!(entity_diff.modified_permissions[0].name, "read");
        assert_eq!(entity_diff.modified_permissions[0].old_expression, "owner");
        assert_eq!(entity_diff.modified_permissions[0].new_expression, "owner or viewer");
    }

    #[test]
    fn added_and_removed_entities_are_reported() {
        let old = "entity a {}\nentity b {}";
        let new = "entity b {}\nentity c {}";
        let (old_model, _) = parse_file(old, None);
        let (new_model, _) = parse_file(new, None);
        let d = diff(&old_model.unwrap(), &new_model.unwrap());
        assert_eq!(d.added_entities, vec!["c".to_string()]);
        assert_eq!(d.removed_entities, vec!["a".to_string()]);
    }
}
