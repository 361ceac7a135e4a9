// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Dynamic SQL fragment builders shared by the graph store's queries.
//!
//! Postgres has no convenient "row IN a list of pairs" operator reachable
//! from a bound parameter array, so a frontier of `(type, id)` pairs is
//! rendered as an `OR`-chain of `(col_a = $n AND col_b = $n+1)` groups, each
//! pair contributing two positional binds tracked by a running counter —
//! the same shape as any other dynamically-sized predicate list built up
//! one clause at a time before being joined and bound in order.

use sqlx::{postgres::PgArguments, Arguments};

/// A `(type, id)` pair used as a graph traversal frontier element.
pub type Pair = (String, String);

/// Render `pairs` as an `OR`-chain of `(type_col = $n AND id_col = $n+1)`
/// groups, continuing a positional parameter sequence from `start_idx`
/// (1-based, as Postgres placeholders are numbered).
///
/// Returns `(sql_fragment, next_idx)`; the caller is responsible for
/// binding `pairs` in order immediately after whatever was bound before
/// `start_idx`. An empty `pairs` list renders as the literal `false`.
pub fn pair_in_clause(type_col: &str, id_col: &str, pairs: &[Pair], start_idx: usize) -> (String, usize) {
    if pairs.is_empty() {
        return ("false".to_string(), start_idx);
    }
    let mut idx = start_idx;
    let mut groups = Vec::with_capacity(pairs.len());
    for _ in pairs {
        groups.push(format!("({type_col} = ${} AND {id_col} = ${})", idx, idx + 1));
        idx += 2;
    }
    (format!("({})", groups.join(" OR ")), idx)
}

/// Bind every pair's two fields, in order, into `args`.
pub fn bind_pairs(args: &mut PgArguments, pairs: &[Pair]) {
    for (t, id) in pairs {
        let _ = args.add(t.clone());
        let _ = args.add(id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pairs_render_as_false() {
        let (sql, next) = pair_in_clause("object_type", "object_id", &[], 1);
        assert_eq!(sql, "false");
        assert_eq!(next, 1);
    }

    #[test]
    fn pairs_render_as_or_chain_with_advancing_indices() {
        let pairs = vec![("user".to_string(), "a".to_string()), ("user".to_string(), "b".to_string())];
        let (sql, next) = pair_in_clause("subject_type", "subject_id", &pairs, 3);
        assert_eq!(
            sql,
            "((subject_type = $3 AND subject_id = $4) OR (subject_type = $5 AND subject_id = $6))"
        );
        assert_eq!(next, 7);
    }
}
