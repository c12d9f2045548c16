//! Demo dataset that generates synthetic timing data for testing
//!
//! A handful of vehicles run sessions on a few club circuits, plus one
//! three-round competition where one entrant skips the final round. Values
//! are deterministic so repeated runs rank identically.

use crate::dataset::{CompetitionResult, Dataset};
use chrono::NaiveDate;
use lapboard_core::laptime::format_seconds;
use lapboard_core::model::{
    Competition, CompetitionTiming, Participant, TimingRecord, VehicleRef,
};
use lapboard_core::scoring::{FlatPoints, PointsTable, ScoringRule, ScoringRuleRecord};

// =============================================================================
// Circuit definitions
// =============================================================================

struct DemoCircuit {
    name: &'static str,
    lanes: &'static [&'static str],
    laps: u32,
    base_lap: f64, // seconds for an average car
}

fn demo_circuits() -> Vec<DemoCircuit> {
    vec![
        DemoCircuit { name: "Carrera Oval", lanes: &["1", "2"], laps: 10, base_lap: 7.8 },
        DemoCircuit { name: "Hillside Loop", lanes: &["1", "2", "3", "4"], laps: 5, base_lap: 14.2 },
        DemoCircuit { name: "Club Tri-Oval", lanes: &["red", "blue"], laps: 20, base_lap: 5.1 },
    ]
}

/// Relative pace per vehicle, 1.0 = average
const VEHICLE_PACE: [f64; 6] = [0.97, 1.0, 1.02, 0.99, 1.05, 1.01];

/// Simple deterministic noise from a seed
fn noise(seed: f64) -> f64 {
    let x = (seed * 12.9898 + 78.233).sin() * 43_758.547;
    x - x.floor()
}

/// Small jitter centered around 0
fn jitter(seed: f64, amplitude: f64) -> f64 {
    (noise(seed) - 0.5) * 2.0 * amplitude
}

fn day(offset: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 6)
        .and_then(|d| d.checked_add_days(chrono::Days::new(u64::from(offset))))
        .unwrap_or_default()
}

// =============================================================================
// Dataset generation
// =============================================================================

fn demo_timings() -> Vec<TimingRecord> {
    let mut timings = Vec::new();
    let mut id = 1;

    for (c, circuit) in demo_circuits().iter().enumerate() {
        for (v, pace) in VEHICLE_PACE.iter().enumerate() {
            // Three sessions per vehicle, on a lane that rotates by vehicle
            for session in 0..3u32 {
                let seed = (c * 100 + v * 10) as f64 + f64::from(session);
                let best = circuit.base_lap * pace + jitter(seed, 0.15);
                let average = best + 0.2 + noise(seed * 1.7) * 0.3;
                let total = average * f64::from(circuit.laps);

                timings.push(TimingRecord {
                    id,
                    vehicle_id: v as u64 + 1,
                    circuit: Some(circuit.name.to_string()),
                    lane: Some(circuit.lanes[v % circuit.lanes.len()].to_string()),
                    laps: Some(circuit.laps),
                    best_lap_time: Some(format_seconds(best)),
                    total_time: Some(format_seconds(total)),
                    average_time: None,
                    timing_date: day(session * 7),
                    current_position: None,
                    previous_position: None,
                    position_change: 0,
                    position_updated_at: None,
                    setup_snapshot: Some(serde_json::json!({
                        "tyres": if session % 2 == 0 { "soft" } else { "medium" },
                        "gear_ratio": 3.4 + f64::from(session) * 0.1,
                    })),
                });
                id += 1;
            }
        }
    }

    // A session logged before circuits were assigned
    timings.push(TimingRecord {
        id,
        vehicle_id: 1,
        circuit: None,
        lane: None,
        laps: None,
        best_lap_time: Some("00:09.120".to_string()),
        total_time: None,
        average_time: None,
        timing_date: day(1),
        current_position: None,
        previous_position: None,
        position_change: 0,
        position_updated_at: None,
        setup_snapshot: None,
    });

    timings
}

fn demo_participants() -> Vec<Participant> {
    let drivers = [
        ("Anouk", VehicleRef::Owned(1), 1),
        ("Bram", VehicleRef::Owned(2), 1),
        ("Chantal", VehicleRef::Model("Scalextric Mini Cooper".to_string()), 2),
        ("Daan", VehicleRef::Owned(4), 1),
        ("Eline", VehicleRef::Model("Ninco Porsche 997".to_string()), 2),
    ];

    drivers
        .into_iter()
        .enumerate()
        .map(|(i, (name, vehicle, category))| Participant {
            id: i as u64 + 1,
            competition_id: 1,
            driver_name: name.to_string(),
            vehicle,
            category_id: Some(category),
        })
        .collect()
}

fn demo_results(participants: &[Participant], rounds: u32) -> Vec<CompetitionResult> {
    let mut results = Vec::new();

    for round in 1..=rounds {
        for (i, participant) in participants.iter().enumerate() {
            // The last entrant misses the final round
            if round == rounds && i == participants.len() - 1 {
                continue;
            }
            let seed = f64::from(round) * 31.0 + i as f64;
            let best = 7.6 + i as f64 * 0.05 + jitter(seed, 0.12);
            let total = (best + 0.25 + noise(seed * 2.3) * 0.2) * 10.0;

            results.push(CompetitionResult {
                competition_id: 1,
                timing: CompetitionTiming {
                    participant_id: participant.id,
                    round_number: round,
                    best_lap_time: Some(format_seconds(best)),
                    total_time: Some(format_seconds(total)),
                    average_time: None,
                    laps: Some(10),
                    lane: Some(((i % 2) + 1).to_string()),
                    // A jump start in round two
                    penalty_seconds: if round == 2 && i == 0 { 5.0 } else { 0.0 },
                },
            });
        }
    }

    results
}

fn demo_rules() -> Vec<ScoringRuleRecord> {
    let championship = PointsTable::new([(1, 10), (2, 8), (3, 6), (4, 5), (5, 4)]);

    vec![
        ScoringRuleRecord {
            id: 1,
            competition_id: Some(1),
            name: Some("Round points".to_string()),
            is_template: false,
            rule: ScoringRule::PerRound {
                points_structure: championship.clone(),
                use_bonus_best_lap: true,
            },
        },
        ScoringRuleRecord {
            id: 2,
            competition_id: None,
            name: Some("Club championship".to_string()),
            is_template: true,
            rule: ScoringRule::PerRound {
                points_structure: championship,
                use_bonus_best_lap: false,
            },
        },
        ScoringRuleRecord {
            id: 3,
            competition_id: None,
            name: Some("Grand prix final".to_string()),
            is_template: true,
            rule: ScoringRule::Final {
                points_structure: PointsTable::new([(1, 25), (2, 18), (3, 15), (4, 12), (5, 10)]),
            },
        },
        ScoringRuleRecord {
            id: 4,
            competition_id: None,
            name: Some("Fastest lap per round".to_string()),
            is_template: true,
            rule: ScoringRule::BestTimePerRound {
                points_structure: FlatPoints { points: 3 },
            },
        },
    ]
}

/// Build the full demo dataset
pub fn demo_dataset() -> Dataset {
    let competition = Competition {
        id: 1,
        name: "Winter Cup".to_string(),
        rounds: 3,
    };
    let participants = demo_participants();
    let results = demo_results(&participants, competition.rounds);

    Dataset {
        timings: demo_timings(),
        competitions: vec![competition],
        participants,
        results,
        rules: demo_rules(),
    }
}
