//! Development host configuration.
//!
//! Read from the environment, after loading a `.env` file if one exists:
//! - `WIKIGRAPH_BIND`: listen address, default `127.0.0.1:3000`
//! - `WIKIGRAPH_CATALOG`: optional JSON catalog for the search endpoint
//! - `WIKIGRAPH_BASE_URL`: base URL the host's own clients use, default `http://{bind}`
//! - `WIKIGRAPH_TIMEOUT_SECS`: outgoing request timeout, default 10

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::client::DEFAULT_TIMEOUT;
use crate::error::ConfigError;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub bind: SocketAddr,
    pub catalog_path: Option<PathBuf>,
    pub base_url: String,
    pub timeout: Duration,
}

impl HostConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_str = var("WIKIGRAPH_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_str
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str.clone()))?;

        let timeout = match var("WIKIGRAPH_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidTimeout(raw))?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            bind,
            catalog_path: var("WIKIGRAPH_CATALOG").map(PathBuf::from),
            base_url: var("WIKIGRAPH_BASE_URL").unwrap_or_else(|| format!("http://{}", bind)),
            timeout,
        })
    }
}
