// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! HTTP handlers for the decision and administration surface.

pub mod admin;
pub mod audit_logs;
pub mod check;
pub mod entity;
pub mod health;
pub mod permission;
pub mod relation;

use std::{future::Future, time::Duration};

use axum::http::HeaderMap;
use permix_core::error::{Error, Result};

use crate::audit::RequestMeta;

/// Race `fut` against `deadline`, mapping a timeout onto
/// `Error::DeadlineExceeded`. Every handler derives a child deadline this
/// way.
pub async fn with_deadline<T>(deadline: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::DeadlineExceeded),
    }
}

/// Pull request metadata (request id, client ip, user agent) out of the
/// incoming headers, for the audit sink.
pub fn request_meta(headers: &HeaderMap) -> RequestMeta {
    RequestMeta {
        request_id: headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        client_ip: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        user_agent: headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

/// Reject a blank required string field.
pub fn require_non_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::MissingFields(field.to_string()));
    }
    Ok(())
}
