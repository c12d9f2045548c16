//! Circuit leaderboard ranking
//!
//! Orders ranking groups by best lap and assigns dense positions with gaps.

use crate::grouping::{group_sessions, RankingGroup};
use crate::laptime::gap;
use crate::model::TimingRecord;
use serde::Serialize;

/// A ranked group on a circuit leaderboard
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub group: RankingGroup,

    /// 1-based, dense within the circuit
    pub position: u32,

    pub gap_to_leader: f64,
    pub gap_to_previous: f64,

    /// Best-session total time against the fastest total on the circuit
    pub gap_to_best_total: f64,

    /// Filled in by the position tracker
    pub previous_position: Option<u32>,
    pub position_change: i32,
}

/// One circuit's ranked entries, as returned by [`rank_all`]
#[derive(Debug, Clone, Serialize)]
pub struct CircuitLeaderboard {
    /// `None` for sessions not assigned to any circuit
    pub circuit: Option<String>,
    pub entries: Vec<LeaderboardEntry>,
}

/// Rank the groups of a single circuit.
///
/// Sorted ascending by best lap. Equal times keep the group whose best session
/// came first in the input ahead, so repeated runs on the same input agree.
pub fn rank_circuit(mut groups: Vec<RankingGroup>) -> Vec<LeaderboardEntry> {
    groups.sort_by(|a, b| {
        a.best_lap_seconds
            .total_cmp(&b.best_lap_seconds)
            .then(a.best_order.cmp(&b.best_order))
    });

    let best_total = groups
        .iter()
        .map(|g| g.best_total_seconds)
        .fold(f64::INFINITY, f64::min);

    let leader_time = groups.first().map(|g| g.best_lap_seconds);
    let mut previous_time = None;
    let mut entries = Vec::with_capacity(groups.len());

    for (index, group) in groups.into_iter().enumerate() {
        let time = group.best_lap_seconds;
        let (gap_to_leader, gap_to_previous) = match (leader_time, previous_time) {
            (Some(leader), Some(previous)) => (gap(time, leader), gap(time, previous)),
            _ => (0.0, 0.0),
        };
        let gap_to_best_total = gap(group.best_total_seconds, best_total);

        previous_time = Some(time);
        entries.push(LeaderboardEntry {
            group,
            position: index as u32 + 1,
            gap_to_leader,
            gap_to_previous,
            gap_to_best_total,
            previous_position: None,
            position_change: 0,
        });
    }

    entries
}

/// Group and rank the records of one circuit
pub fn rank_records(records: Vec<TimingRecord>) -> Vec<LeaderboardEntry> {
    rank_circuit(group_sessions(records))
}

/// Rank an unscoped set of records, one leaderboard per circuit.
///
/// Named circuits come back alphabetically, unassigned sessions last.
pub fn rank_all(records: Vec<TimingRecord>) -> Vec<CircuitLeaderboard> {
    let mut partitions: Vec<(Option<String>, Vec<RankingGroup>)> = Vec::new();

    for group in group_sessions(records) {
        match partitions.iter_mut().find(|(c, _)| *c == group.key.circuit) {
            Some((_, groups)) => groups.push(group),
            None => partitions.push((group.key.circuit.clone(), vec![group])),
        }
    }

    partitions.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    partitions
        .into_iter()
        .map(|(circuit, groups)| CircuitLeaderboard {
            circuit,
            entries: rank_circuit(groups),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::tests::session;

    fn with_total(mut r: TimingRecord, total: &str) -> TimingRecord {
        r.total_time = Some(total.to_string());
        r
    }

    #[test]
    fn test_positions_are_dense_and_ordered() {
        let entries = rank_records(vec![
            session(1, 1, Some("Spa"), None, Some(5), "00:21.000"),
            session(2, 2, Some("Spa"), None, Some(5), "00:19.500"),
            session(3, 3, Some("Spa"), None, Some(5), "00:20.250"),
            session(4, 4, Some("Spa"), None, Some(5), "00:22.000"),
        ]);

        let positions: Vec<u32> = entries.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);

        let vehicles: Vec<u64> = entries.iter().map(|e| e.group.key.vehicle_id).collect();
        assert_eq!(vehicles, vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_leader_gaps_are_zero_and_gaps_accumulate() {
        let entries = rank_records(vec![
            session(1, 1, Some("Spa"), None, None, "00:20.000"),
            session(2, 2, Some("Spa"), None, None, "00:20.500"),
            session(3, 3, Some("Spa"), None, None, "00:22.000"),
        ]);

        assert_eq!(entries[0].gap_to_leader, 0.0);
        assert_eq!(entries[0].gap_to_previous, 0.0);
        assert!((entries[1].gap_to_leader - 0.5).abs() < 1e-9);
        assert!((entries[2].gap_to_leader - 2.0).abs() < 1e-9);
        assert!((entries[2].gap_to_previous - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_equal_lap_times_rank_first_input_higher() {
        for _ in 0..5 {
            let entries = rank_records(vec![
                session(7, 1, Some("Spa"), None, None, "01:23.456"),
                session(8, 2, Some("Spa"), None, None, "01:23.456"),
            ]);
            assert_eq!(entries[0].group.best_session().id, 7);
            assert_eq!(entries[1].group.best_session().id, 8);
            assert_eq!(entries[1].position, 2);
        }
    }

    #[test]
    fn test_tie_uses_best_session_order_not_group_order() {
        // Vehicle 1 appears first, but its tying session is logged after vehicle 2's
        let entries = rank_records(vec![
            session(1, 1, Some("Spa"), None, None, "01:30.000"),
            session(2, 2, Some("Spa"), None, None, "01:23.456"),
            session(3, 1, Some("Spa"), None, None, "01:23.456"),
        ]);
        assert_eq!(entries[0].group.key.vehicle_id, 2);
    }

    #[test]
    fn test_unrankable_sorts_last() {
        let entries = rank_records(vec![
            session(1, 1, Some("Spa"), None, None, "n/a"),
            session(2, 2, Some("Spa"), None, None, "09:59.999"),
            session(3, 3, Some("Spa"), None, None, "00:10.000"),
        ]);

        assert_eq!(entries[2].group.key.vehicle_id, 1);
        assert_eq!(entries[2].position, 3);
        assert_eq!(entries[2].gap_to_leader, f64::INFINITY);
    }

    #[test]
    fn test_gap_to_best_total() {
        let entries = rank_records(vec![
            with_total(session(1, 1, Some("Spa"), None, None, "00:20.000"), "01:45.000"),
            with_total(session(2, 2, Some("Spa"), None, None, "00:21.000"), "01:40.000"),
        ]);

        assert!((entries[0].gap_to_best_total - 5.0).abs() < 1e-9);
        assert_eq!(entries[1].gap_to_best_total, 0.0);
    }

    #[test]
    fn test_rank_all_partitions_by_circuit() {
        let boards = rank_all(vec![
            session(1, 1, None, None, None, "00:20.000"),
            session(2, 1, Some("Zolder"), None, None, "00:20.000"),
            session(3, 2, Some("Assen"), None, None, "00:25.000"),
            session(4, 3, Some("Assen"), None, None, "00:24.000"),
        ]);

        let circuits: Vec<Option<&str>> = boards.iter().map(|b| b.circuit.as_deref()).collect();
        assert_eq!(circuits, vec![Some("Assen"), Some("Zolder"), None]);
        assert_eq!(boards[0].entries[0].group.key.vehicle_id, 3);
        assert_eq!(boards[2].entries[0].position, 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(rank_records(Vec::new()).is_empty());
    }
}
