//! Background recompute scheduler
//!
//! This module handles:
//! - Waking on a fixed interval
//! - Finding circuits that received sessions since their last recompute
//! - Recomputing each of them through the shared recomputer

use crate::state::AppState;
use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Main scheduler loop; returns once `cancel` fires
pub async fn run(state: AppState, interval: Duration, cancel: CancellationToken) {
    info!("Recompute scheduler started (every {:?})", interval);

    loop {
        if let Err(e) = recompute_cycle(&state).await {
            error!("Error in recompute cycle: {}", e);
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(interval) => {}
        }
    }

    info!("Recompute scheduler stopped");
}

/// Recompute every dirty circuit once; returns how many succeeded
pub async fn recompute_cycle(state: &AppState) -> Result<usize> {
    let dirty = state.store.dirty_circuits()?;
    if dirty.is_empty() {
        debug!("No circuits to recompute");
        return Ok(0);
    }

    let mut done = 0;
    for circuit in dirty {
        match state.recomputer.recompute(&circuit).await {
            Ok(_) => done += 1,
            // Left dirty, so the next cycle tries again
            Err(e) => warn!("Scheduled recompute of {} failed: {}", circuit, e),
        }
    }

    Ok(done)
}
