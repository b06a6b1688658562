//! Process configuration, read from the environment once at startup.

use std::net::SocketAddr;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_ADDR is not a socket address: {0}")]
    BindAddr(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Postgres connection string; `None` runs on the in-memory store.
    pub database_url: Option<String>,
}

impl ApiConfig {
    /// - `BIND_ADDR` (default `0.0.0.0:8080`)
    /// - `JWT_SECRET` (insecure dev default, with a warning, when unset)
    /// - `DATABASE_URL` (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::BindAddr(bind.clone()))?;

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());

        Ok(Self {
            bind_addr,
            jwt_secret,
            database_url,
        })
    }

    /// In-memory configuration for tests and local runs.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            database_url: None,
        }
    }
}
