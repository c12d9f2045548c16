//! Competition standings
//!
//! Entrants who completed every round are classified ahead of those who did
//! not, whatever their partial time. Inside each tier the lower total wins.

use crate::laptime::gap;
use crate::model::{
    CategoryId, Competition, CompetitionTiming, Participant, ParticipantId, VehicleRef,
};
use crate::scoring::{self, ScoringRule};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Aggregate classification line for one participant
#[derive(Debug, Clone, Serialize)]
pub struct Standing {
    pub participant_id: ParticipantId,
    pub driver_name: Option<String>,
    pub vehicle: Option<VehicleRef>,
    pub category_id: Option<CategoryId>,

    /// Sum of total time plus penalty over the recorded rounds
    pub total_time_seconds: f64,
    pub best_lap_seconds: f64,
    pub rounds_completed: u32,
    pub total_laps: u32,
    pub complete: bool,

    pub position: u32,
    pub points: u32,
    pub gap_to_leader: f64,
    pub gap_to_previous: f64,
}

#[derive(Default)]
struct Tally {
    first_seen: usize,
    total: f64,
    best_lap: f64,
    rounds: BTreeSet<u32>,
    laps: u32,
}

/// Aggregate round timings into an ordered classification (points left at 0).
///
/// `rounds` is the competition's round count, used for the completion tier.
pub fn aggregate(timings: &[CompetitionTiming], rounds: u32) -> Vec<Standing> {
    let mut order: Vec<ParticipantId> = Vec::new();
    let mut tallies: HashMap<ParticipantId, Tally> = HashMap::new();

    for timing in timings {
        let tally = tallies.entry(timing.participant_id).or_insert_with(|| {
            order.push(timing.participant_id);
            Tally {
                first_seen: order.len() - 1,
                best_lap: f64::INFINITY,
                ..Tally::default()
            }
        });
        tally.total += timing.adjusted_seconds();
        tally.best_lap = tally.best_lap.min(timing.best_lap_seconds());
        tally.rounds.insert(timing.round_number);
        tally.laps = tally.laps.saturating_add(timing.laps.unwrap_or(0));
    }

    let mut lines: Vec<(usize, Standing)> = order
        .into_iter()
        .filter_map(|id| tallies.remove(&id).map(|t| (id, t)))
        .map(|(id, t)| {
            let rounds_completed = t.rounds.len() as u32;
            (
                t.first_seen,
                Standing {
                    participant_id: id,
                    driver_name: None,
                    vehicle: None,
                    category_id: None,
                    total_time_seconds: t.total,
                    best_lap_seconds: t.best_lap,
                    rounds_completed,
                    total_laps: t.laps,
                    complete: rounds_completed >= rounds,
                    position: 0,
                    points: 0,
                    gap_to_leader: 0.0,
                    gap_to_previous: 0.0,
                },
            )
        })
        .collect();

    lines.sort_by(|(a_seen, a), (b_seen, b)| {
        b.complete
            .cmp(&a.complete)
            .then(a.total_time_seconds.total_cmp(&b.total_time_seconds))
            .then(a_seen.cmp(b_seen))
    });

    let mut standings: Vec<Standing> = lines.into_iter().map(|(_, s)| s).collect();
    let leader = standings.first().map(|s| s.total_time_seconds);
    let mut previous = None;

    for (index, standing) in standings.iter_mut().enumerate() {
        standing.position = index as u32 + 1;
        if let (Some(leader), Some(previous)) = (leader, previous) {
            standing.gap_to_leader = gap(standing.total_time_seconds, leader);
            standing.gap_to_previous = gap(standing.total_time_seconds, previous);
        }
        previous = Some(standing.total_time_seconds);
    }

    standings
}

/// Full classification: aggregate, score, and attach participant details.
///
/// With `category` set, only that category's entrants are classified, and
/// positions and points are computed among them alone. Participants without
/// any recorded round are left out.
pub fn classify(
    competition: &Competition,
    participants: &[Participant],
    timings: &[CompetitionTiming],
    rules: &[ScoringRule],
    category: Option<CategoryId>,
) -> Vec<Standing> {
    let roster: HashMap<ParticipantId, &Participant> = participants
        .iter()
        .filter(|p| category.map_or(true, |c| p.category_id == Some(c)))
        .map(|p| (p.id, p))
        .collect();

    let timings: Vec<CompetitionTiming> = timings
        .iter()
        .filter(|t| category.is_none() || roster.contains_key(&t.participant_id))
        .cloned()
        .collect();

    let mut standings = aggregate(&timings, competition.rounds);
    let final_order: Vec<ParticipantId> = standings.iter().map(|s| s.participant_id).collect();
    let points = scoring::score(rules, &timings, &final_order);

    for standing in standings.iter_mut() {
        standing.points = points.get(&standing.participant_id).copied().unwrap_or(0);
        if let Some(p) = roster.get(&standing.participant_id) {
            standing.driver_name = Some(p.driver_name.clone());
            standing.vehicle = Some(p.vehicle.clone());
            standing.category_id = p.category_id;
        }
    }

    standings
}
