// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Shared application state.

use std::{sync::Arc, time::Duration};

use permix_core::graph::GraphStore;

use crate::audit::AuditSink;

/// Deadline applied to read-shaped handlers (`/check`, `GET /entity`, ...).
pub const READ_DEADLINE: Duration = Duration::from_secs(5);

/// Deadline applied to write-shaped handlers (`/entity`, `/relation`, ...).
pub const WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// Deadline applied to the schema-apply handler, which runs a full
/// diff-and-migrate pass.
pub const MIGRATE_DEADLINE: Duration = Duration::from_secs(30);

/// State shared across every handler: the graph store and the audit sink.
///
/// `Clone` is cheap — both fields are `Arc`-backed, matching axum's
/// `with_state` convention of cloning state per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn GraphStore>,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    pub fn new(store: Arc<dyn GraphStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }
}
