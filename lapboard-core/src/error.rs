//! Error types shared across the workspace

use crate::model::{CompetitionId, ParticipantId};
use thiserror::Error;

/// Rejections from scoring-rule validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("points structure for a {0} rule needs at least one position")]
    EmptyPoints(&'static str),

    #[error("points structure key {0:?} is not a positive position")]
    InvalidPosition(String),
}

/// Failures reported by a [`crate::store::TimingStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The circuit changed between snapshot and write; recompute from scratch
    #[error("circuit {circuit} changed during recompute (snapshot v{expected}, now v{found})")]
    Conflict {
        circuit: String,
        expected: u64,
        found: u64,
    },

    #[error("competition {0} not found")]
    CompetitionNotFound(CompetitionId),

    #[error("participant {0} not found")]
    ParticipantNotFound(ParticipantId),

    #[error("round {round} is outside 1..={rounds}")]
    RoundOutOfRange { round: u32, rounds: u32 },

    #[error("participant {participant} already has a result for round {round}")]
    DuplicateRound { participant: ParticipantId, round: u32 },

    #[error("scoring rules of competition {0} are locked once timings exist")]
    RulesLocked(CompetitionId),

    #[error(transparent)]
    InvalidRule(#[from] RuleError),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the caller should retry the whole operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
