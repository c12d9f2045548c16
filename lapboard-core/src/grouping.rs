//! Session grouping
//!
//! Sessions that share vehicle, circuit, lane and lap count compete as one
//! leaderboard entry, represented by their fastest session.

use crate::model::{TimingRecord, VehicleId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Text used for a missing key component
pub const UNSET: &str = "unset";

/// Identity of a ranking group. `None` components bucket together; they are
/// not wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub vehicle_id: VehicleId,
    pub circuit: Option<String>,
    pub lane: Option<String>,
    pub laps: Option<u32>,
}

impl GroupKey {
    pub fn of(record: &TimingRecord) -> Self {
        Self {
            vehicle_id: record.vehicle_id,
            circuit: record.circuit.clone(),
            lane: record.lane.clone(),
            laps: record.laps,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let laps = self.laps.map(|l| l.to_string());
        write!(
            f,
            "{}|{}|{}|{}",
            self.vehicle_id,
            self.circuit.as_deref().unwrap_or(UNSET),
            self.lane.as_deref().unwrap_or(UNSET),
            laps.as_deref().unwrap_or(UNSET),
        )
    }
}

/// All sessions sharing a [`GroupKey`], with the best one selected
#[derive(Debug, Clone, Serialize)]
pub struct RankingGroup {
    pub key: GroupKey,
    pub sessions: Vec<TimingRecord>,

    /// Index into `sessions` of the fastest session
    pub best: usize,

    /// Position of the best session in the grouper's input
    pub best_order: usize,

    pub best_lap_seconds: f64,
    pub best_total_seconds: f64,
}

impl RankingGroup {
    fn new(key: GroupKey, record: TimingRecord, order: usize) -> Self {
        let best_lap_seconds = record.best_lap_seconds();
        let best_total_seconds = record.total_seconds();
        Self {
            key,
            sessions: vec![record],
            best: 0,
            best_order: order,
            best_lap_seconds,
            best_total_seconds,
        }
    }

    fn push(&mut self, record: TimingRecord, order: usize) {
        let lap = record.best_lap_seconds();
        // Strictly faster only: on equal times (including two unrankable
        // sessions) the earlier session stays best.
        if lap < self.best_lap_seconds {
            self.best = self.sessions.len();
            self.best_order = order;
            self.best_lap_seconds = lap;
            self.best_total_seconds = record.total_seconds();
        }
        self.sessions.push(record);
    }

    pub fn best_session(&self) -> &TimingRecord {
        &self.sessions[self.best]
    }

    /// Position recorded by the previous recompute, if any.
    ///
    /// The best session is consulted first; if the best session changed since
    /// then, the old position lives on one of its siblings.
    pub fn recorded_position(&self) -> Option<u32> {
        self.best_session()
            .current_position
            .or_else(|| self.sessions.iter().find_map(|s| s.current_position))
    }
}

/// Group records by `(vehicle, circuit, lane, laps)`.
///
/// Groups come back in order of first appearance. Pure function of the input.
pub fn group_sessions<I>(records: I) -> Vec<RankingGroup>
where
    I: IntoIterator<Item = TimingRecord>,
{
    let mut groups: Vec<RankingGroup> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();

    for (order, record) in records.into_iter().enumerate() {
        let key = GroupKey::of(&record);
        match index.get(&key) {
            Some(&i) => groups[i].push(record, order),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(RankingGroup::new(key, record, order));
            }
        }
    }

    groups
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// Helper to construct a session with the fields grouping looks at
    pub(crate) fn session(
        id: u64,
        vehicle_id: u64,
        circuit: Option<&str>,
        lane: Option<&str>,
        laps: Option<u32>,
        best: &str,
    ) -> TimingRecord {
        TimingRecord {
            id,
            vehicle_id,
            circuit: circuit.map(str::to_string),
            lane: lane.map(str::to_string),
            laps,
            best_lap_time: Some(best.to_string()),
            total_time: None,
            average_time: None,
            timing_date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            current_position: None,
            previous_position: None,
            position_change: 0,
            position_updated_at: None,
            setup_snapshot: None,
        }
    }

    #[test]
    fn test_groups_by_full_key() {
        let groups = group_sessions(vec![
            session(1, 1, Some("Spa"), Some("A"), Some(5), "00:20.000"),
            session(2, 1, Some("Spa"), Some("A"), Some(5), "00:19.000"),
            session(3, 1, Some("Spa"), Some("B"), Some(5), "00:18.000"),
            session(4, 1, Some("Spa"), Some("A"), Some(10), "00:18.500"),
            session(5, 2, Some("Spa"), Some("A"), Some(5), "00:21.000"),
        ]);

        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0].sessions.len(), 2);
        assert_eq!(groups[0].best_session().id, 2);
        assert_eq!(groups[0].best_order, 1);
    }

    #[test]
    fn test_missing_fields_share_a_bucket() {
        let groups = group_sessions(vec![
            session(1, 1, Some("Spa"), None, None, "00:20.000"),
            session(2, 1, Some("Spa"), None, None, "00:19.000"),
            session(3, 1, Some("Spa"), Some("unset"), None, "00:19.500"),
        ]);

        // A literal "unset" lane is still a real lane, distinct from a missing one
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].sessions.len(), 2);
        assert_eq!(groups[0].key.to_string(), "1|Spa|unset|unset");
    }

    #[test]
    fn test_tie_keeps_first_session() {
        let groups = group_sessions(vec![
            session(10, 1, Some("Spa"), None, Some(3), "01:23.456"),
            session(11, 1, Some("Spa"), None, Some(3), "01:23.456"),
        ]);
        assert_eq!(groups[0].best_session().id, 10);
    }

    #[test]
    fn test_unrankable_session_never_beats_valid_one() {
        let groups = group_sessions(vec![
            session(1, 1, Some("Spa"), None, None, "bad"),
            session(2, 1, Some("Spa"), None, None, "00:30.000"),
            session(3, 1, Some("Spa"), None, None, "1:00.000"),
        ]);
        assert_eq!(groups[0].best_session().id, 2);
    }

    #[test]
    fn test_recorded_position_falls_back_to_sibling() {
        let mut old_best = session(1, 1, Some("Spa"), None, None, "00:30.000");
        old_best.current_position = Some(4);
        let new_best = session(2, 1, Some("Spa"), None, None, "00:29.000");

        let groups = group_sessions(vec![old_best, new_best]);
        assert_eq!(groups[0].best_session().id, 2);
        assert_eq!(groups[0].recorded_position(), Some(4));
    }
}
