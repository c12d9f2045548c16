//! Circuit leaderboard recompute
//!
//! Runs the reset-then-write position update for one circuit. Writers for the
//! same circuit queue on an async mutex; a write that finds its snapshot stale
//! starts over from a fresh snapshot.

use chrono::Utc;
use lapboard_core::error::StoreError;
use lapboard_core::ranking::rank_records;
use lapboard_core::store::TimingStore;
use lapboard_core::tracking;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum RecomputeError {
    #[error("circuit {circuit} kept changing; gave up after {attempts} attempts")]
    Conflict { circuit: String, attempts: u32 },

    #[error("no timing data for circuit {0}")]
    UnknownCircuit(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a successful recompute
#[derive(Debug, Clone, Serialize)]
pub struct RecomputeSummary {
    pub circuit: String,
    pub attempts: u32,
    pub groups: usize,
    pub sessions: usize,
    pub moved: usize,
}

/// Serializes recomputes per circuit and retries stale snapshots
#[derive(Clone)]
pub struct Recomputer {
    store: Arc<dyn TimingStore>,
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
    max_attempts: u32,
}

impl Recomputer {
    pub fn new(store: Arc<dyn TimingStore>, max_attempts: u32) -> Self {
        Self {
            store,
            locks: Arc::new(Mutex::new(HashMap::new())),
            max_attempts: max_attempts.max(1),
        }
    }

    fn lock_for(&self, circuit: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(circuit.to_string()).or_default().clone()
    }

    /// Recompute and persist positions for one circuit
    pub async fn recompute(&self, circuit: &str) -> Result<RecomputeSummary, RecomputeError> {
        // Unknown names never get a lock entry
        if !self.store.circuits()?.iter().any(|c| c == circuit) {
            return Err(RecomputeError::UnknownCircuit(circuit.to_string()));
        }

        let lock = self.lock_for(circuit);
        let _guard = lock.lock().await;

        for attempt in 1..=self.max_attempts {
            let snapshot = self.store.circuit_snapshot(circuit)?;
            if snapshot.records.is_empty() {
                return Err(RecomputeError::UnknownCircuit(circuit.to_string()));
            }
            let sessions = snapshot.records.len();

            let mut entries = rank_records(snapshot.records);
            tracking::track(&mut entries);
            let plan = tracking::plan(circuit, &entries, Utc::now());

            match self.store.apply_positions(&plan, snapshot.version) {
                Ok(()) => {
                    let summary = RecomputeSummary {
                        circuit: circuit.to_string(),
                        attempts: attempt,
                        groups: entries.len(),
                        sessions,
                        moved: entries.iter().filter(|e| e.position_change != 0).count(),
                    };
                    info!(
                        "Recomputed {}: {} groups from {} sessions, {} moved",
                        circuit, summary.groups, summary.sessions, summary.moved
                    );
                    return Ok(summary);
                }
                Err(e) if e.is_retryable() => {
                    warn!("Recompute of {} attempt {} was stale: {}", circuit, attempt, e);
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        debug!("Recompute of {} exhausted {} attempts", circuit, self.max_attempts);
        Err(RecomputeError::Conflict {
            circuit: circuit.to_string(),
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lapboard_core::model::TimingRecord;
    use lapboard_store::MemoryStore;

    fn session(circuit: &str) -> TimingRecord {
        TimingRecord {
            id: 0,
            vehicle_id: 1,
            circuit: Some(circuit.to_string()),
            lane: None,
            laps: Some(5),
            best_lap_time: Some("00:10.000".to_string()),
            total_time: None,
            average_time: None,
            timing_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            current_position: None,
            previous_position: None,
            position_change: 0,
            position_updated_at: None,
            setup_snapshot: None,
        }
    }

    fn lock_names(recomputer: &Recomputer) -> Vec<String> {
        let mut names: Vec<String> = recomputer.locks.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_unknown_circuits_do_not_register_locks() {
        let store = Arc::new(MemoryStore::new());
        store.insert_timing(session("Spa")).unwrap();
        let recomputer = Recomputer::new(store, DEFAULT_ATTEMPTS);

        for i in 0..50 {
            let name = format!("ghost-{}", i);
            assert!(matches!(
                recomputer.recompute(&name).await,
                Err(RecomputeError::UnknownCircuit(_))
            ));
        }
        assert!(lock_names(&recomputer).is_empty());

        recomputer.recompute("Spa").await.unwrap();
        recomputer.recompute("Spa").await.unwrap();
        assert_eq!(lock_names(&recomputer), vec!["Spa".to_string()]);
    }
}
