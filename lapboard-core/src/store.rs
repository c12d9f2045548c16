//! Storage collaborator trait definition

use crate::error::StoreError;
use crate::model::{
    Competition, CompetitionId, CompetitionTiming, Participant, TimingRecord,
};
use crate::scoring::ScoringRuleRecord;
use crate::tracking::PositionPlan;

/// Timing records of one circuit, taken at a single version
#[derive(Debug, Clone)]
pub struct CircuitSnapshot {
    pub circuit: String,
    pub version: u64,
    pub records: Vec<TimingRecord>,
}

/// Everything needed to classify one competition
#[derive(Debug, Clone)]
pub struct CompetitionSnapshot {
    pub competition: Competition,
    pub participants: Vec<Participant>,
    pub timings: Vec<CompetitionTiming>,
    pub rules: Vec<ScoringRuleRecord>,
}

/// Trait for storage backends feeding the engine
///
/// Each backend is responsible for:
/// - Handing out scoped, consistent snapshots
/// - Applying a position plan atomically, or refusing it when stale
/// - Tracking which circuits changed since their last recompute
pub trait TimingStore: Send + Sync {
    /// Get the name of this backend
    fn name(&self) -> &str;

    /// Circuits that have at least one timing record
    fn circuits(&self) -> Result<Vec<String>, StoreError>;

    /// All timing records of one circuit, with the circuit's current version
    fn circuit_snapshot(&self, circuit: &str) -> Result<CircuitSnapshot, StoreError>;

    /// All timing records, unscoped
    fn all_timings(&self) -> Result<Vec<TimingRecord>, StoreError>;

    /// Log a new session and return it as stored (id assigned)
    ///
    /// Bumps the circuit version and marks the circuit dirty.
    fn insert_timing(&self, record: TimingRecord) -> Result<TimingRecord, StoreError>;

    /// Apply both phases of a position plan as one unit
    ///
    /// Returns `StoreError::Conflict` if the circuit version no longer equals
    /// `expected_version`; nothing is written in that case.
    fn apply_positions(&self, plan: &PositionPlan, expected_version: u64)
        -> Result<(), StoreError>;

    /// Circuits written to since their last applied plan
    fn dirty_circuits(&self) -> Result<Vec<String>, StoreError>;

    fn competition_snapshot(&self, id: CompetitionId) -> Result<CompetitionSnapshot, StoreError>;

    /// Record a round result
    ///
    /// Rejects rounds outside `1..=rounds` and a second result for the same
    /// participant and round.
    fn insert_competition_timing(
        &self,
        competition: CompetitionId,
        timing: CompetitionTiming,
    ) -> Result<(), StoreError>;

    /// Attach a validated rule to a competition
    ///
    /// Rejected once the competition has any timing.
    fn insert_rule(
        &self,
        competition: CompetitionId,
        record: ScoringRuleRecord,
    ) -> Result<ScoringRuleRecord, StoreError>;

    /// Template rules available to copy onto competitions
    fn rule_templates(&self) -> Result<Vec<ScoringRuleRecord>, StoreError>;
}
