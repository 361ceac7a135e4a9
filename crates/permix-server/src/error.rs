// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! HTTP error envelope: `{code, message, details?}`.
//!
//! Wraps [`permix_core::Error`] so it can implement axum's [`IntoResponse`]
//! without `permix-core` taking a dependency on axum.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use permix_core::error::Error as CoreError;
use serde::Serialize;

/// The JSON body every 4xx/5xx response carries.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Newtype wrapping [`CoreError`] so the orphan rule permits an
/// [`IntoResponse`] impl here instead of in `permix-core`.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error.code = self.0.code(), error.message = %self.0, "request failed");
        } else {
            tracing::warn!(error.code = self.0.code(), error.message = %self.0, "request rejected");
        }
        let body = ErrorBody {
            code: self.0.code(),
            message: self.0.to_string(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}
