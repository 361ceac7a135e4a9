// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! permix-server: HTTP decision and administration surface for the permix
//! authorization engine.

use std::{path::Path, sync::Arc, time::Duration};

use permix_server::{
    audit::{AuditSink, NoopAuditSink, PostgresAuditSink},
    config::Config,
    router::build_router,
    state::{AppState, MIGRATE_DEADLINE},
};
use permix_store::PgGraphStore;

const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "permix_server=info,permix_eval=info,permix_store=info".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    let pool = permix_store::connect(&config.db_url).await?;
    let store: Arc<dyn permix_core::graph::GraphStore> = Arc::new(PgGraphStore::new(pool.clone()));

    if Path::new(&config.schema_path).exists() {
        load_schema(&store, &config.schema_path).await?;
    } else {
        tracing::info!(path = %config.schema_path, "no schema file found, skipping startup load");
    }

    let audit: Arc<dyn AuditSink> = Arc::new(PostgresAuditSink::new(pool));
    let state = AppState::new(store, audit);

    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %config.bind_addr(), "permix-server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn load_schema(store: &Arc<dyn permix_core::graph::GraphStore>, schema_path: &str) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(schema_path)?;
    let (model, diagnostics) = permix_schema::parser::parse_file(&source, Some(schema_path));
    for diag in &diagnostics {
        tracing::warn!(line = diag.line, column = diag.column, message = %diag.message, "schema diagnostic");
    }
    let model = model.ok_or_else(|| anyhow::anyhow!("failed to parse {schema_path}"))?;

    let outcome = tokio::time::timeout(
        MIGRATE_DEADLINE,
        permix_schema::migrator::apply(store.as_ref(), &model, "startup load", schema_path),
    )
    .await
    .map_err(|_| anyhow::anyhow!("applying {schema_path} exceeded its deadline"))??;

    match outcome {
        permix_schema::migrator::MigrateOutcome::NoChanges => {
            tracing::info!(path = %schema_path, "schema unchanged since last load");
        }
        permix_schema::migrator::MigrateOutcome::Applied(version, _diff) => {
            tracing::info!(path = %schema_path, version = version.version, "schema applied");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!(timeout = ?GRACEFUL_SHUTDOWN_TIMEOUT, "shutdown signal received, draining in-flight requests");
}
