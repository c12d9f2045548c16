//! Timing and competition data model
//!
//! These are the records handed to the engine by the storage collaborator.
//! Text time fields stay as stored (`MM:SS.mmm`); the engine parses them on
//! demand so an unparseable value never blocks loading.

use crate::laptime;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type TimingId = u64;
pub type VehicleId = u64;
pub type ParticipantId = u64;
pub type CompetitionId = u64;
pub type CategoryId = u64;
pub type RuleId = u64;

/// One timed session of a vehicle on a circuit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingRecord {
    pub id: TimingId,
    pub vehicle_id: VehicleId,

    /// `None` means the session is not assigned to a circuit
    #[serde(default)]
    pub circuit: Option<String>,

    #[serde(default)]
    pub lane: Option<String>,

    #[serde(default)]
    pub laps: Option<u32>,

    #[serde(default)]
    pub best_lap_time: Option<String>,

    #[serde(default)]
    pub total_time: Option<String>,

    /// Derived from `total_time / laps` when the session is logged
    #[serde(default)]
    pub average_time: Option<String>,

    pub timing_date: NaiveDate,

    // === Written only by a leaderboard recompute ===
    #[serde(default)]
    pub current_position: Option<u32>,

    #[serde(default)]
    pub previous_position: Option<u32>,

    #[serde(default)]
    pub position_change: i32,

    #[serde(default)]
    pub position_updated_at: Option<DateTime<Utc>>,

    /// Equipment configuration reference, not interpreted by the engine
    #[serde(default)]
    pub setup_snapshot: Option<serde_json::Value>,
}

impl TimingRecord {
    /// Parsed best lap, `+∞` when unrankable
    pub fn best_lap_seconds(&self) -> f64 {
        laptime::parse_opt(self.best_lap_time.as_deref())
    }

    /// Parsed total time, `+∞` when unrankable
    pub fn total_seconds(&self) -> f64 {
        laptime::parse_opt(self.total_time.as_deref())
    }

    /// Fill in `average_time` from total time and laps if it is missing
    pub fn derive_average(&mut self) {
        if self.average_time.is_none() {
            self.average_time = laptime::average_lap_time(self.total_time.as_deref(), self.laps);
        }
    }
}

/// A competition with a fixed number of rounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Competition {
    pub id: CompetitionId,
    pub name: String,
    pub rounds: u32,
}

/// Which vehicle an entrant drives. Exactly one form is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum VehicleRef {
    /// A vehicle from the owner's collection
    Owned(VehicleId),
    /// Free-text model name for vehicles outside the collection
    Model(String),
}

impl VehicleRef {
    pub fn label(&self) -> String {
        match self {
            VehicleRef::Owned(id) => format!("vehicle #{}", id),
            VehicleRef::Model(model) => model.clone(),
        }
    }
}

/// An entrant in a competition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub id: ParticipantId,
    pub competition_id: CompetitionId,
    pub driver_name: String,
    pub vehicle: VehicleRef,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

/// One round's result for a participant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompetitionTiming {
    pub participant_id: ParticipantId,
    pub round_number: u32,

    #[serde(default)]
    pub best_lap_time: Option<String>,

    #[serde(default)]
    pub total_time: Option<String>,

    #[serde(default)]
    pub average_time: Option<String>,

    #[serde(default)]
    pub laps: Option<u32>,

    #[serde(default)]
    pub lane: Option<String>,

    /// Seconds added to `total_time` before any comparison
    #[serde(default)]
    pub penalty_seconds: f64,
}

impl CompetitionTiming {
    /// Total time plus penalty, `+∞` when the total is unrankable
    pub fn adjusted_seconds(&self) -> f64 {
        laptime::parse_opt(self.total_time.as_deref()) + self.penalty_seconds.max(0.0)
    }

    pub fn best_lap_seconds(&self) -> f64 {
        laptime::parse_opt(self.best_lap_time.as_deref())
    }
}
