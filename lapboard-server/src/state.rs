//! Application state management

use crate::recompute::{Recomputer, DEFAULT_ATTEMPTS};
use lapboard_core::store::TimingStore;
use lapboard_store::MemoryStore;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Storage backend all handlers read snapshots from
    pub store: Arc<dyn TimingStore>,

    /// Single writer per circuit for position updates
    pub recomputer: Recomputer,
}

impl AppState {
    pub fn new(store: Arc<dyn TimingStore>, recompute_attempts: u32) -> Self {
        let recomputer = Recomputer::new(store.clone(), recompute_attempts);
        Self { store, recomputer }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_ATTEMPTS)
    }
}
