// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! `GET /health`: liveness, backed by a real round-trip to the catalog
//! database.

use axum::extract::State;
use serde::Serialize;

use crate::{
    error::ApiError,
    handlers::with_deadline,
    state::{AppState, READ_DEADLINE},
};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Result<axum::Json<HealthResponse>, ApiError> {
    with_deadline(READ_DEADLINE, state.store.ping()).await?;
    Ok(axum::Json(HealthResponse { status: "ok" }))
}
