// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Apply protocol driving a parsed [`Model`] into the catalog.
//!
//! Reading the current version, loading the current model, and diffing
//! (bailing out on "no changes") happen here; the transaction, wholesale
//! replace, and version row are delegated to [`GraphStore::apply_model`],
//! which owns the storage engine's transactional boundary; appending the
//! history row, on success or failure, happens here around that call.

use permix_core::{
    graph::GraphStore,
    model::{Model, ModelVersion, MigrationHistoryEntry},
    Result,
};

use crate::diff::{diff, ModelDiff};

/// Outcome of [`apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum MigrateOutcome {
    /// The new model was identical to the current one; no version was
    /// created.
    NoChanges,
    /// The new model was applied; carries the new version row and the diff
    /// that produced it.
    Applied(ModelVersion, ModelDiff),
}

/// Run the apply protocol against `store`.
///
/// `description` and `source_file` are recorded on the new
/// [`ModelVersion`](permix_core::model::ModelVersion) row when a change is
/// applied.
pub async fn apply(store: &dyn GraphStore, new_model: &Model, description: &str, source_file: &str) -> Result<MigrateOutcome> {
    let current_model = store.load_current_model().await?;
    let computed_diff = diff(&current_model, new_model);

    if computed_diff.is_empty() {
        return Ok(MigrateOutcome::NoChanges);
    }

    let entities: Vec<_> = new_model.entities.values().cloned().collect();
    let rules: Vec<_> = new_model.rules.values().cloned().collect();
    let current_version = store.current_version().await?.map(|v| v.version).unwrap_or(0);

    match store.apply_model(&entities, &rules, description, source_file).await {
        Ok(version) => {
            store
                .append_migration_history(MigrationHistoryEntry {
                    version: version.version,
                    success: true,
                    error: None,
                    diff: computed_diff.render(),
                    created_at: version.applied_at,
                })
                .await?;
            Ok(MigrateOutcome::Applied(version, computed_diff))
        }
        Err(err) => {
            store
                .append_migration_history(MigrationHistoryEntry {
                    version: current_version + 1,
                    success: false,
                    error: Some(err.to_string()),
                    diff: computed_diff.render(),
                    created_at: chrono::Utc::now(),
                })
                .await?;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use permix_core::graph::fake::FakeGraphStore;

    use super::*;
    use crate::parser::parse_file;

    #[tokio::test]
    async fn first_apply_creates_version_one() {
        let store = FakeGraphStore::new();
        let (model, _) = parse_file("entity document {\n  permission read = owner\n}", None);
        let outcome = apply(&store, &model.unwrap(), "initial schema", "s1.perm").await.unwrap();
        match outcome {
            MigrateOutcome::Applied(version, _) => assert_eq!(version.version, 1),
            MigrateOutcome::NoChanges => panic!("expected a version to be created"),
        }
    }

    #[tokio::test]
    async fn reapplying_identical_model_is_idempotent() {
        let store = FakeGraphStore::new();
        let src = "entity document {\n  permission read = owner\n}";
        let (model, _) = parse_file(src, None);
        let model = model.unwrap();
        apply(&store, &model, "v1", "s1.perm").await.unwrap();
        let second = apply(&store, &model, "v1 again", "s1.perm").await.unwrap();
        assert_eq!(second, MigrateOutcome::NoChanges);
        assert_eq!(store.current_version().await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn modified_permission_bumps_version_and_carries_diff() {
        let store = FakeGraphStore::new();
        let (v1, _) = parse_file("entity document {\n  permission read = owner\n}", None);
        apply(&store, &v1.unwrap(), "v1", "s1.perm").await.unwrap();

        let (v2, _) = parse_file("entity document {\n  permission read = owner or viewer\n}", None);
        let outcome = apply(&store, &v2.unwrap(), "v2", "s2.perm").await.unwrap();
        match outcome {
            MigrateOutcome::Applied(version, diff) => {
                assert_eq!(version.version, 2);
                assert_eq!(diff.changed_entities[0].1.modified_permissions[0].name, "read");
            }
            MigrateOutcome::NoChanges => panic!("expected version 2"),
        }
    }
}
