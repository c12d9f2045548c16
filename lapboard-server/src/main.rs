//! Lapboard Server
//!
//! Leaderboard and standings REST API with a background recompute scheduler

use anyhow::Result;
use lapboard_core::store::TimingStore;
use lapboard_server::{api, config::ServerConfig, scheduler, state};
use lapboard_store::{demo_dataset, Dataset, MemoryStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting Lapboard Server");

    let config = ServerConfig::from_env()?;

    // Seed the store
    let store: Arc<dyn TimingStore> = match (&config.dataset, config.demo) {
        (Some(path), _) => {
            info!("Loading dataset from {}", path.display());
            Arc::new(MemoryStore::from_dataset(Dataset::load(path)?))
        }
        (None, true) => {
            info!("Loading demo dataset");
            Arc::new(MemoryStore::from_dataset(demo_dataset()))
        }
        (None, false) => {
            warn!("No dataset configured; starting with an empty store");
            Arc::new(MemoryStore::new())
        }
    };

    // Create application state
    let state = state::AppState::new(store, config.recompute_attempts);

    // Build the router
    let app = api::create_router(state.clone());

    // Start recompute scheduler in background
    let cancel = CancellationToken::new();
    let scheduler = tokio::spawn(scheduler::run(
        state.clone(),
        config.recompute_interval,
        cancel.clone(),
    ));

    // Start server
    info!("Server listening on http://{}", config.bind);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    scheduler.await?;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
    cancel.cancel();
}
