//! Integration tests for the recompute protocol and scheduler

use chrono::NaiveDate;
use lapboard_core::error::StoreError;
use lapboard_core::model::{CompetitionId, CompetitionTiming, TimingRecord};
use lapboard_core::scoring::ScoringRuleRecord;
use lapboard_core::store::{CircuitSnapshot, CompetitionSnapshot, TimingStore};
use lapboard_core::tracking::PositionPlan;
use lapboard_server::recompute::{RecomputeError, Recomputer};
use lapboard_server::scheduler;
use lapboard_server::state::AppState;
use lapboard_store::MemoryStore;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn session(vehicle_id: u64, circuit: &str, best: &str) -> TimingRecord {
    TimingRecord {
        id: 0,
        vehicle_id,
        circuit: Some(circuit.to_string()),
        lane: None,
        laps: Some(10),
        best_lap_time: Some(best.to_string()),
        total_time: None,
        average_time: None,
        timing_date: NaiveDate::from_ymd_opt(2024, 9, 14).unwrap(),
        current_position: None,
        previous_position: None,
        position_change: 0,
        position_updated_at: None,
        setup_snapshot: None,
    }
}

/// Wraps a MemoryStore and lands a new session right before each of the
/// first `interruptions` position writes, as a concurrent writer would.
struct ContendedStore {
    inner: MemoryStore,
    interruptions: AtomicU32,
}

impl ContendedStore {
    fn new(interruptions: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            interruptions: AtomicU32::new(interruptions),
        }
    }
}

impl TimingStore for ContendedStore {
    fn name(&self) -> &str {
        "Contended"
    }

    fn circuits(&self) -> Result<Vec<String>, StoreError> {
        self.inner.circuits()
    }

    fn circuit_snapshot(&self, circuit: &str) -> Result<CircuitSnapshot, StoreError> {
        self.inner.circuit_snapshot(circuit)
    }

    fn all_timings(&self) -> Result<Vec<TimingRecord>, StoreError> {
        self.inner.all_timings()
    }

    fn insert_timing(&self, record: TimingRecord) -> Result<TimingRecord, StoreError> {
        self.inner.insert_timing(record)
    }

    fn apply_positions(&self, plan: &PositionPlan, expected_version: u64) -> Result<(), StoreError> {
        let left = self.interruptions.load(Ordering::SeqCst);
        if left > 0 {
            self.interruptions.store(left - 1, Ordering::SeqCst);
            self.inner
                .insert_timing(session(100 + u64::from(left), &plan.circuit, "00:30.000"))?;
        }
        self.inner.apply_positions(plan, expected_version)
    }

    fn dirty_circuits(&self) -> Result<Vec<String>, StoreError> {
        self.inner.dirty_circuits()
    }

    fn competition_snapshot(&self, id: CompetitionId) -> Result<CompetitionSnapshot, StoreError> {
        self.inner.competition_snapshot(id)
    }

    fn insert_competition_timing(
        &self,
        competition: CompetitionId,
        timing: CompetitionTiming,
    ) -> Result<(), StoreError> {
        self.inner.insert_competition_timing(competition, timing)
    }

    fn insert_rule(
        &self,
        competition: CompetitionId,
        record: ScoringRuleRecord,
    ) -> Result<ScoringRuleRecord, StoreError> {
        self.inner.insert_rule(competition, record)
    }

    fn rule_templates(&self) -> Result<Vec<ScoringRuleRecord>, StoreError> {
        self.inner.rule_templates()
    }
}

#[tokio::test]
async fn test_recompute_retries_after_stale_snapshot() {
    let store = Arc::new(ContendedStore::new(1));
    store.insert_timing(session(1, "Spa", "00:10.000")).unwrap();

    let recomputer = Recomputer::new(store.clone(), 3);
    let summary = recomputer.recompute("Spa").await.unwrap();

    assert_eq!(summary.attempts, 2);
    // The interrupting session is part of the retried ranking
    assert_eq!(summary.groups, 2);

    let records = store.circuit_snapshot("Spa").unwrap().records;
    let mut positions: Vec<u32> = records.iter().filter_map(|r| r.current_position).collect();
    positions.sort();
    assert_eq!(positions, vec![1, 2]);
}

#[tokio::test]
async fn test_recompute_gives_up_with_retryable_conflict() {
    let store = Arc::new(ContendedStore::new(10));
    store.insert_timing(session(1, "Spa", "00:10.000")).unwrap();

    let recomputer = Recomputer::new(store.clone(), 3);
    let err = recomputer.recompute("Spa").await.unwrap_err();

    assert!(matches!(err, RecomputeError::Conflict { attempts: 3, .. }));
    let records = store.circuit_snapshot("Spa").unwrap().records;
    assert!(records.iter().all(|r| r.current_position.is_none()));
}

#[tokio::test]
async fn test_concurrent_recomputes_leave_a_complete_ranking() {
    let store = Arc::new(MemoryStore::new());
    for (vehicle, best) in [(1, "00:10.000"), (2, "00:10.100"), (3, "00:10.200")] {
        store.insert_timing(session(vehicle, "Spa", best)).unwrap();
    }

    let recomputer = Recomputer::new(store.clone(), 3);
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let r = recomputer.clone();
            tokio::spawn(async move { r.recompute("Spa").await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let records = store.circuit_snapshot("Spa").unwrap().records;
    let positions: Vec<Option<u32>> = records.iter().map(|r| r.current_position).collect();
    assert_eq!(positions, vec![Some(1), Some(2), Some(3)]);
    // Repeated recomputes of an unchanged circuit never invent movement
    assert!(records.iter().all(|r| r.position_change == 0));
}

#[tokio::test]
async fn test_recompute_unknown_circuit() {
    let store = Arc::new(MemoryStore::new());
    let recomputer = Recomputer::new(store, 3);
    assert!(matches!(
        recomputer.recompute("Nowhere").await,
        Err(RecomputeError::UnknownCircuit(_))
    ));
}

#[tokio::test]
async fn test_scheduler_cycle_recomputes_dirty_circuits() {
    let store = Arc::new(MemoryStore::new());
    store.insert_timing(session(1, "Spa", "00:10.000")).unwrap();
    store.insert_timing(session(1, "Zolder", "00:11.000")).unwrap();

    let state = AppState::new(store.clone(), 3);
    assert_eq!(scheduler::recompute_cycle(&state).await.unwrap(), 2);
    assert!(store.dirty_circuits().unwrap().is_empty());

    // Nothing changed, nothing to do
    assert_eq!(scheduler::recompute_cycle(&state).await.unwrap(), 0);

    store.insert_timing(session(2, "Spa", "00:09.000")).unwrap();
    assert_eq!(scheduler::recompute_cycle(&state).await.unwrap(), 1);
}

#[tokio::test]
async fn test_scheduler_stops_on_cancel() {
    let state = AppState::default();
    let cancel = tokio_util::sync::CancellationToken::new();
    let handle = tokio::spawn(scheduler::run(
        state,
        std::time::Duration::from_secs(3600),
        cancel.clone(),
    ));

    cancel.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop promptly")
        .unwrap();
}
