// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! HTTP decision and administration surface for the permix authorization
//! engine.

pub mod audit;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use audit::{AuditSink, NoopAuditSink, PostgresAuditSink};
pub use config::Config;
pub use router::build_router;
pub use state::AppState;
