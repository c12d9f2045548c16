//! Competition scoring rules and the points engine
//!
//! A rule is one of a closed set of variants, each with its own payload
//! shape. Rules on the same competition are applied independently and summed.

use crate::error::RuleError;
use crate::model::{CompetitionId, CompetitionTiming, ParticipantId, RuleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Finishing position (1-based) to points
///
/// Serialized with string keys, e.g. `{"1": 10, "2": 8}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, u32>", into = "BTreeMap<String, u32>")]
pub struct PointsTable(BTreeMap<u32, u32>);

impl PointsTable {
    pub fn new<I: IntoIterator<Item = (u32, u32)>>(entries: I) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Points for a position; positions without an entry score 0
    pub fn points_for(&self, position: usize) -> u32 {
        u32::try_from(position)
            .ok()
            .and_then(|p| self.0.get(&p))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn has_zero_position(&self) -> bool {
        self.0.contains_key(&0)
    }
}

impl TryFrom<BTreeMap<String, u32>> for PointsTable {
    type Error = RuleError;

    fn try_from(raw: BTreeMap<String, u32>) -> Result<Self, Self::Error> {
        raw.into_iter()
            .map(|(k, v)| {
                k.trim()
                    .parse::<u32>()
                    .map(|p| (p, v))
                    .map_err(|_| RuleError::InvalidPosition(k))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(PointsTable)
    }
}

impl From<PointsTable> for BTreeMap<String, u32> {
    fn from(table: PointsTable) -> Self {
        table.0.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

/// Payload of a `best_time_per_round` rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatPoints {
    pub points: u32,
}

/// A scoring policy, tagged by `rule_type` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule_type", rename_all = "snake_case")]
pub enum ScoringRule {
    /// Points per round by finishing order, optional +1 for the fastest lap
    PerRound {
        points_structure: PointsTable,
        #[serde(default)]
        use_bonus_best_lap: bool,
    },
    /// Points once, by final classification
    Final { points_structure: PointsTable },
    /// Fixed points to the fastest lap of each round
    BestTimePerRound { points_structure: FlatPoints },
}

impl ScoringRule {
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringRule::PerRound { .. } => "per_round",
            ScoringRule::Final { .. } => "final",
            ScoringRule::BestTimePerRound { .. } => "best_time_per_round",
        }
    }

    /// Reject configurations the engine assumes never reach it
    pub fn validate(&self) -> Result<(), RuleError> {
        match self {
            ScoringRule::PerRound { points_structure, .. }
            | ScoringRule::Final { points_structure } => {
                if points_structure.is_empty() {
                    return Err(RuleError::EmptyPoints(self.kind()));
                }
                if points_structure.has_zero_position() {
                    return Err(RuleError::InvalidPosition("0".to_string()));
                }
                Ok(())
            }
            ScoringRule::BestTimePerRound { .. } => Ok(()),
        }
    }
}

/// A stored rule: either attached to a competition or a reusable template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRuleRecord {
    pub id: RuleId,
    #[serde(default)]
    pub competition_id: Option<CompetitionId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_template: bool,
    #[serde(flatten)]
    pub rule: ScoringRule,
}

/// Timings bucketed by round, input order preserved inside each round
fn by_round(timings: &[CompetitionTiming]) -> BTreeMap<u32, Vec<&CompetitionTiming>> {
    let mut rounds: BTreeMap<u32, Vec<&CompetitionTiming>> = BTreeMap::new();
    for timing in timings {
        rounds.entry(timing.round_number).or_default().push(timing);
    }
    rounds
}

/// Participant with the fastest rankable lap; the earlier record wins a tie
fn fastest_lap(round: &[&CompetitionTiming]) -> Option<ParticipantId> {
    let mut best: Option<(f64, ParticipantId)> = None;
    for timing in round {
        let lap = timing.best_lap_seconds();
        if !lap.is_finite() {
            continue;
        }
        if best.map_or(true, |(t, _)| lap < t) {
            best = Some((lap, timing.participant_id));
        }
    }
    best.map(|(_, id)| id)
}

/// Totals saturate at `u32::MAX` rather than wrapping
fn award(points: &mut BTreeMap<ParticipantId, u32>, id: ParticipantId, amount: u32) {
    let total = points.entry(id).or_default();
    *total = total.saturating_add(amount);
}

/// Apply every rule to a competition's timings and sum points per participant.
///
/// `final_order` is the classification order from the standings aggregator;
/// only `final` rules read it.
pub fn score(
    rules: &[ScoringRule],
    timings: &[CompetitionTiming],
    final_order: &[ParticipantId],
) -> BTreeMap<ParticipantId, u32> {
    let mut points: BTreeMap<ParticipantId, u32> = BTreeMap::new();
    let rounds = by_round(timings);

    for rule in rules {
        match rule {
            ScoringRule::PerRound {
                points_structure,
                use_bonus_best_lap,
            } => {
                for round in rounds.values() {
                    let mut order = round.clone();
                    order.sort_by(|a, b| a.adjusted_seconds().total_cmp(&b.adjusted_seconds()));

                    for (index, timing) in order.iter().enumerate() {
                        award(
                            &mut points,
                            timing.participant_id,
                            points_structure.points_for(index + 1),
                        );
                    }

                    if *use_bonus_best_lap {
                        if let Some(id) = fastest_lap(round) {
                            award(&mut points, id, 1);
                        }
                    }
                }
            }
            ScoringRule::Final { points_structure } => {
                for (index, id) in final_order.iter().enumerate() {
                    award(&mut points, *id, points_structure.points_for(index + 1));
                }
            }
            ScoringRule::BestTimePerRound { points_structure } => {
                for round in rounds.values() {
                    if let Some(id) = fastest_lap(round) {
                        award(&mut points, id, points_structure.points);
                    }
                }
            }
        }
    }

    points
}
