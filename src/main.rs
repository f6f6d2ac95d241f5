//! Wikigraph development host.
//!
//! Serves the search, preview and graph endpoints the core talks to, over an
//! optional JSON catalog. See `config` for the environment it reads.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wikigraph::{app, catalog::Catalog, AppState, HostConfig};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wikigraph=info")),
        )
        .init();

    let config = match HostConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let catalog = match &config.catalog_path {
        Some(path) => match Catalog::load(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to load catalog");
                std::process::exit(1);
            }
        },
        None => {
            info!("no catalog configured (set WIKIGRAPH_CATALOG); search returns nothing");
            Catalog::default()
        }
    };

    let router = app(AppState::new(catalog));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .expect("Failed to bind listen address");

    info!(
        bind = %config.bind,
        base_url = %config.base_url,
        timeout_secs = config.timeout.as_secs(),
        "wikigraph host running"
    );

    axum::serve(listener, router).await.expect("Server error");
}
