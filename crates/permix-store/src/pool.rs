// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Connection pool setup: bounded (25 connections), with idle/lifetime
//! limits.

use std::time::Duration;

use permix_core::error::{Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Maximum number of pooled connections.
pub const MAX_CONNECTIONS: u32 = 25;

/// How long a connection may sit idle before being closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Maximum lifetime of a single pooled connection, regardless of use.
const MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Connect to `database_url`, applying the pool-sizing policy above, and
/// run the embedded migrations.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect(database_url)
        .await
        .map_err(|e| Error::StorageFailure(format!("failed to connect to catalog database: {e}")))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| Error::StorageFailure(format!("failed to run catalog migrations: {e}")))?;

    Ok(pool)
}
