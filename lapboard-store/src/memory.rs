//! In-memory storage backend
//!
//! Keeps every record behind one `RwLock`. Each circuit carries a version that
//! moves on every write touching it, which is how a recompute finds out its
//! snapshot went stale between reading and writing.

use crate::dataset::Dataset;
use lapboard_core::error::StoreError;
use lapboard_core::model::{
    Competition, CompetitionId, CompetitionTiming, Participant, TimingId, TimingRecord,
};
use lapboard_core::scoring::ScoringRuleRecord;
use lapboard_core::store::{CircuitSnapshot, CompetitionSnapshot, TimingStore};
use lapboard_core::tracking::PositionPlan;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Inner {
    timings: Vec<TimingRecord>,
    next_timing_id: TimingId,
    versions: HashMap<String, u64>,
    dirty: BTreeSet<String>,

    competitions: BTreeMap<CompetitionId, Competition>,
    participants: Vec<Participant>,
    results: BTreeMap<CompetitionId, Vec<CompetitionTiming>>,
    rules: Vec<ScoringRuleRecord>,
    next_rule_id: u64,
}

impl Inner {
    fn bump(&mut self, circuit: &str) {
        *self.versions.entry(circuit.to_string()).or_insert(0) += 1;
    }

    fn version(&self, circuit: &str) -> u64 {
        self.versions.get(circuit).copied().unwrap_or(0)
    }

    fn competition(&self, id: CompetitionId) -> Result<&Competition, StoreError> {
        self.competitions
            .get(&id)
            .ok_or(StoreError::CompetitionNotFound(id))
    }
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_timing_id: 1,
                next_rule_id: 1,
                ..Inner::default()
            }),
        }
    }

    /// Build a store from a dataset. Every named circuit starts dirty so the
    /// first scheduler pass persists positions for it.
    pub fn from_dataset(dataset: Dataset) -> Self {
        let mut inner = Inner::default();

        for mut record in dataset.timings {
            record.derive_average();
            if let Some(circuit) = &record.circuit {
                inner.versions.entry(circuit.clone()).or_insert(0);
                inner.dirty.insert(circuit.clone());
            }
            inner.timings.push(record);
        }
        inner.next_timing_id = inner.timings.iter().map(|t| t.id).max().unwrap_or(0) + 1;

        for competition in dataset.competitions {
            inner.competitions.insert(competition.id, competition);
        }
        inner.participants = dataset.participants;
        for result in dataset.results {
            inner
                .results
                .entry(result.competition_id)
                .or_default()
                .push(result.timing);
        }
        inner.next_rule_id = dataset.rules.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        inner.rules = dataset.rules;

        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Current version of a circuit (0 if unknown)
    pub fn circuit_version(&self, circuit: &str) -> u64 {
        self.read().map(|inner| inner.version(circuit)).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingStore for MemoryStore {
    fn name(&self) -> &str {
        "Memory"
    }

    fn circuits(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.read()?;
        let circuits: BTreeSet<String> = inner
            .timings
            .iter()
            .filter_map(|t| t.circuit.clone())
            .collect();
        Ok(circuits.into_iter().collect())
    }

    fn circuit_snapshot(&self, circuit: &str) -> Result<CircuitSnapshot, StoreError> {
        let inner = self.read()?;
        let records = inner
            .timings
            .iter()
            .filter(|t| t.circuit.as_deref() == Some(circuit))
            .cloned()
            .collect();

        Ok(CircuitSnapshot {
            circuit: circuit.to_string(),
            version: inner.version(circuit),
            records,
        })
    }

    fn all_timings(&self) -> Result<Vec<TimingRecord>, StoreError> {
        Ok(self.read()?.timings.clone())
    }

    fn insert_timing(&self, mut record: TimingRecord) -> Result<TimingRecord, StoreError> {
        let mut inner = self.write()?;

        record.id = inner.next_timing_id;
        inner.next_timing_id += 1;
        record.derive_average();
        record.current_position = None;
        record.previous_position = None;
        record.position_change = 0;
        record.position_updated_at = None;

        if let Some(circuit) = record.circuit.clone() {
            inner.bump(&circuit);
            inner.dirty.insert(circuit);
        }
        inner.timings.push(record.clone());

        Ok(record)
    }

    fn apply_positions(
        &self,
        plan: &PositionPlan,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;

        let found = inner.version(&plan.circuit);
        if found != expected_version {
            return Err(StoreError::Conflict {
                circuit: plan.circuit.clone(),
                expected: expected_version,
                found,
            });
        }

        let resets: BTreeSet<TimingId> = plan.resets.iter().copied().collect();
        let writes: HashMap<TimingId, _> = plan.writes.iter().map(|w| (w.timing_id, w)).collect();

        let circuit = Some(plan.circuit.as_str());
        for record in inner
            .timings
            .iter_mut()
            .filter(|t| t.circuit.as_deref() == circuit)
        {
            if resets.contains(&record.id) {
                record.current_position = None;
                record.previous_position = None;
                record.position_change = 0;
            }
            if let Some(update) = writes.get(&record.id) {
                record.current_position = Some(update.current_position);
                record.previous_position = update.previous_position;
                record.position_change = update.position_change;
                record.position_updated_at = Some(plan.computed_at);
            }
        }

        inner.bump(&plan.circuit);
        inner.dirty.remove(&plan.circuit);
        Ok(())
    }

    fn dirty_circuits(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read()?.dirty.iter().cloned().collect())
    }

    fn competition_snapshot(&self, id: CompetitionId) -> Result<CompetitionSnapshot, StoreError> {
        let inner = self.read()?;
        let competition = inner.competition(id)?.clone();

        Ok(CompetitionSnapshot {
            competition,
            participants: inner
                .participants
                .iter()
                .filter(|p| p.competition_id == id)
                .cloned()
                .collect(),
            timings: inner.results.get(&id).cloned().unwrap_or_default(),
            rules: inner
                .rules
                .iter()
                .filter(|r| !r.is_template && r.competition_id == Some(id))
                .cloned()
                .collect(),
        })
    }

    fn insert_competition_timing(
        &self,
        competition: CompetitionId,
        timing: CompetitionTiming,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let rounds = inner.competition(competition)?.rounds;

        if !inner
            .participants
            .iter()
            .any(|p| p.id == timing.participant_id && p.competition_id == competition)
        {
            return Err(StoreError::ParticipantNotFound(timing.participant_id));
        }

        if timing.round_number == 0 || timing.round_number > rounds {
            return Err(StoreError::RoundOutOfRange {
                round: timing.round_number,
                rounds,
            });
        }

        let results = inner.results.entry(competition).or_default();
        if results
            .iter()
            .any(|t| t.participant_id == timing.participant_id && t.round_number == timing.round_number)
        {
            return Err(StoreError::DuplicateRound {
                participant: timing.participant_id,
                round: timing.round_number,
            });
        }

        let mut timing = timing;
        timing.penalty_seconds = timing.penalty_seconds.max(0.0);
        if timing.average_time.is_none() {
            timing.average_time = lapboard_core::laptime::average_lap_time(
                timing.total_time.as_deref(),
                timing.laps,
            );
        }
        results.push(timing);
        Ok(())
    }

    fn insert_rule(
        &self,
        competition: CompetitionId,
        mut record: ScoringRuleRecord,
    ) -> Result<ScoringRuleRecord, StoreError> {
        record.rule.validate()?;

        let mut inner = self.write()?;
        inner.competition(competition)?;
        if inner.results.get(&competition).is_some_and(|r| !r.is_empty()) {
            return Err(StoreError::RulesLocked(competition));
        }

        record.id = inner.next_rule_id;
        inner.next_rule_id += 1;
        record.competition_id = Some(competition);
        record.is_template = false;
        inner.rules.push(record.clone());

        Ok(record)
    }

    fn rule_templates(&self) -> Result<Vec<ScoringRuleRecord>, StoreError> {
        Ok(self
            .read()?
            .rules
            .iter()
            .filter(|r| r.is_template)
            .cloned()
            .collect())
    }
}
