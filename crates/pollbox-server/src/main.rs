//! # pollbox-server
//!
//! HTTP API server for pollbox, an anonymous polling service.
//!
//! This binary provides:
//! - **Poll CRUD** -- create polls, fetch one with live percentages, and
//!   list by status/category with recent/popular/ending ordering
//! - **Vote submission** -- one vote per visitor per poll, enforced by the
//!   store's uniqueness constraint so racing duplicates cannot both land
//! - **Search and stats** -- substring search over questions and platform
//!   counters for the stats page
//! - **Expiry sweep** -- an optional periodic task that persists
//!   `completed` for polls past their expiry (reads re-derive it anyway)

mod api;
mod config;
mod error;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use pollbox_core::PollService;
use pollbox_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pollbox_server=debug")),
        )
        .init();

    info!("Starting pollbox server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open storage and build the service
    // -----------------------------------------------------------------------
    // The storage handle is constructed here and injected; nothing else in
    // the process initializes storage.
    let database = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::open_default()?,
    };

    let service = Arc::new(PollService::new(database));
    let app_state = AppState {
        service: service.clone(),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn the periodic expiry sweep
    // -----------------------------------------------------------------------
    if config.sweep_interval_secs > 0 {
        let sweeper = service.clone();
        let period = std::time::Duration::from_secs(config.sweep_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = sweeper.sweep_expired() {
                    tracing::warn!(error = %e, "expiry sweep failed");
                }
            }
        });
    }

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
