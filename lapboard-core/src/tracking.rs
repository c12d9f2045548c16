//! Position tracking across leaderboard recomputes
//!
//! A recompute is persisted in two phases against one snapshot: every session
//! on the circuit has its position cleared, then each group's best session
//! receives the freshly computed position. Only the best session of a group
//! carries a position afterwards.

use crate::model::TimingId;
use crate::ranking::LeaderboardEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase-two write for one timing record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub timing_id: TimingId,
    pub current_position: u32,
    pub previous_position: Option<u32>,
    pub position_change: i32,
}

/// A complete reset-then-write plan for one circuit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPlan {
    pub circuit: String,

    /// Phase one: every record of the circuit snapshot
    pub resets: Vec<TimingId>,

    /// Phase two: one write per ranking group
    pub writes: Vec<PositionUpdate>,

    pub computed_at: DateTime<Utc>,
}

/// Positive when the group climbed, negative when it dropped
fn change(previous: Option<u32>, current: u32) -> i32 {
    previous.map_or(0, |p| p as i32 - current as i32)
}

/// Compare a new ranking against the positions recorded by the last recompute.
///
/// Groups without a recorded position are debuts: no previous, change 0.
pub fn track(entries: &mut [LeaderboardEntry]) {
    for entry in entries.iter_mut() {
        let previous = entry.group.recorded_position();
        entry.previous_position = previous;
        entry.position_change = change(previous, entry.position);
    }
}

/// Annotate a freshly ranked leaderboard for display.
///
/// When the best session already holds the computed position, the ranking has
/// been persisted and the stored movement is shown. Otherwise the movement is
/// what a recompute would write right now.
pub fn observe(entries: &mut [LeaderboardEntry]) {
    for entry in entries.iter_mut() {
        let best = entry.group.best_session();
        if best.current_position == Some(entry.position) {
            entry.previous_position = best.previous_position;
            entry.position_change = best.position_change;
        } else {
            let previous = entry.group.recorded_position();
            entry.previous_position = previous;
            entry.position_change = change(previous, entry.position);
        }
    }
}

/// Build the two-phase persistence plan for a tracked circuit ranking
pub fn plan(circuit: &str, entries: &[LeaderboardEntry], now: DateTime<Utc>) -> PositionPlan {
    let resets = entries
        .iter()
        .flat_map(|e| e.group.sessions.iter().map(|s| s.id))
        .collect();

    let writes = entries
        .iter()
        .map(|e| PositionUpdate {
            timing_id: e.group.best_session().id,
            current_position: e.position,
            previous_position: e.previous_position,
            position_change: e.position_change,
        })
        .collect();

    PositionPlan {
        circuit: circuit.to_string(),
        resets,
        writes,
        computed_at: now,
    }
}
