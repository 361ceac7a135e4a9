// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! PostgreSQL-backed [`permix_core::GraphStore`] for the permix
//! authorization engine.
//!
//! [`PgGraphStore`] owns a bounded `sqlx::PgPool` and a readers-writer
//! rule cache; [`rows`] maps catalog rows onto
//! `permix-core`'s storage-agnostic domain types, and [`sql`] builds the
//! dynamic multi-pair predicates the BFS traversal needs.

pub mod pool;
pub mod rows;
pub mod sql;
pub mod store;

pub use pool::connect;
pub use store::PgGraphStore;
