// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Environment-variable configuration.
//!
//! No configuration-file framework: three environment variables, read once
//! at startup (`DB_URL` rather than the more common `DATABASE_URL`, to
//! match this deployment's existing environment).

/// Default bind address when `LISTEN_ADDR` is unset.
pub const DEFAULT_LISTEN_ADDR: &str = ":4780";

/// Default schema path when `SCHEMA_PATH` is unset.
pub const DEFAULT_SCHEMA_PATH: &str = "./permissions/schema.perm";

/// Engine configuration, assembled once from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Catalog database DSN (`DB_URL`, required).
    pub db_url: String,
    /// Address to bind the HTTP listener on (`LISTEN_ADDR`, default
    /// `:4780`).
    pub listen_addr: String,
    /// Path to a `.perm` file to apply at startup (`SCHEMA_PATH`, default
    /// `./permissions/schema.perm`; absent on disk means skip the load).
    pub schema_path: String,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// Fails only if `DB_URL` is unset — every other variable has a
    /// default.
    pub fn from_env() -> anyhow::Result<Self> {
        let db_url = std::env::var("DB_URL").map_err(|_| anyhow::anyhow!("DB_URL must be set"))?;
        let listen_addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());
        let schema_path = std::env::var("SCHEMA_PATH").unwrap_or_else(|_| DEFAULT_SCHEMA_PATH.to_string());
        Ok(Self {
            db_url,
            listen_addr,
            schema_path,
        })
    }

    /// Normalise `listen_addr` (`:4780` style, Go-ism from the distilled
    /// source) into something [`tokio::net::TcpListener::bind`] accepts.
    pub fn bind_addr(&self) -> String {
        if let Some(port) = self.listen_addr.strip_prefix(':') {
            format!("0.0.0.0:{port}")
        } else {
            self.listen_addr.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_expands_bare_port() {
        let cfg = Config {
            db_url: "postgres://x".into(),
            listen_addr: ":4780".into(),
            schema_path: DEFAULT_SCHEMA_PATH.into(),
        };
        assert_eq!(cfg.bind_addr(), "0.0.0.0:4780");
    }

    #[test]
    fn bind_addr_passes_through_explicit_host() {
        let cfg = Config {
            db_url: "postgres://x".into(),
            listen_addr: "127.0.0.1:9000".into(),
            schema_path: DEFAULT_SCHEMA_PATH.into(),
        };
        assert_eq!(cfg.bind_addr(), "127.0.0.1:9000");
    }
}
