//! REST API routes
//!
//! Handlers take a snapshot from the store, run the engine, and format times
//! and gaps for display. Unrankable values render as placeholders rather than
//! failing the request.

use crate::recompute::{RecomputeError, RecomputeSummary};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use lapboard_core::error::StoreError;
use lapboard_core::laptime::{self, display_lap_time, display_seconds, format_gap};
use lapboard_core::model::{
    CategoryId, Competition, CompetitionId, CompetitionTiming, TimingRecord, VehicleId,
};
use lapboard_core::ranking::{rank_all, rank_records, LeaderboardEntry};
use lapboard_core::scoring::{ScoringRule, ScoringRuleRecord};
use lapboard_core::standings::{classify, Standing};
use lapboard_core::tracking;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

type ApiError = (StatusCode, String);

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/circuits", get(list_circuits))
        .route("/api/circuits/:circuit/leaderboard", get(circuit_leaderboard))
        .route("/api/circuits/:circuit/recompute", post(recompute_circuit))
        .route("/api/leaderboard", get(global_leaderboard))
        .route("/api/timings", post(create_timing))
        // Competition endpoints
        .route("/api/competitions/:id/standings", get(competition_standings))
        .route("/api/competitions/:id/rules", get(list_rules).post(create_rule))
        .route(
            "/api/competitions/:id/rules/from-template/:template_id",
            post(create_rule_from_template),
        )
        .route("/api/competitions/:id/timings", post(create_competition_timing))
        .route("/api/scoring-templates", get(list_templates))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn store_error(e: StoreError) -> ApiError {
    let status = match &e {
        StoreError::Conflict { .. } | StoreError::DuplicateRound { .. } | StoreError::RulesLocked(_) => {
            StatusCode::CONFLICT
        }
        StoreError::CompetitionNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::ParticipantNotFound(_)
        | StoreError::RoundOutOfRange { .. }
        | StoreError::InvalidRule(_) => StatusCode::BAD_REQUEST,
        StoreError::Backend(_) => {
            tracing::error!("Storage failure: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

// === Health ===

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "store": state.store.name(),
    }))
}

// === Circuit Leaderboards ===

async fn list_circuits(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    state.store.circuits().map(Json).map_err(store_error)
}

/// One leaderboard line, formatted for display
#[derive(Serialize)]
struct LeaderboardRow {
    position: u32,
    previous_position: Option<u32>,
    position_change: i32,
    vehicle_id: VehicleId,
    circuit: Option<String>,
    lane: Option<String>,
    laps: Option<u32>,
    timing_id: u64,
    timing_date: NaiveDate,
    sessions: usize,
    best_lap_time: String,
    total_time: String,
    average_time: String,
    gap_to_leader: String,
    gap_to_previous: String,
    gap_to_best_total: String,
}

impl From<&LeaderboardEntry> for LeaderboardRow {
    fn from(entry: &LeaderboardEntry) -> Self {
        let best = entry.group.best_session();
        Self {
            position: entry.position,
            previous_position: entry.previous_position,
            position_change: entry.position_change,
            vehicle_id: entry.group.key.vehicle_id,
            circuit: entry.group.key.circuit.clone(),
            lane: entry.group.key.lane.clone(),
            laps: entry.group.key.laps,
            timing_id: best.id,
            timing_date: best.timing_date,
            sessions: entry.group.sessions.len(),
            best_lap_time: display_lap_time(best.best_lap_time.as_deref()),
            total_time: display_lap_time(best.total_time.as_deref()),
            average_time: display_lap_time(best.average_time.as_deref()),
            gap_to_leader: format_gap(Some(entry.gap_to_leader)),
            gap_to_previous: format_gap(Some(entry.gap_to_previous)),
            gap_to_best_total: format_gap(Some(entry.gap_to_best_total)),
        }
    }
}

#[derive(Serialize)]
struct LeaderboardResponse {
    circuit: Option<String>,
    entries: Vec<LeaderboardRow>,
}

async fn circuit_leaderboard(
    State(state): State<AppState>,
    Path(circuit): Path<String>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let snapshot = state.store.circuit_snapshot(&circuit).map_err(store_error)?;
    if snapshot.records.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            format!("No timing data for circuit {}", circuit),
        ));
    }

    let mut entries = rank_records(snapshot.records);
    tracking::observe(&mut entries);

    Ok(Json(LeaderboardResponse {
        circuit: Some(circuit),
        entries: entries.iter().map(LeaderboardRow::from).collect(),
    }))
}

async fn global_leaderboard(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardResponse>>, ApiError> {
    let records = state.store.all_timings().map_err(store_error)?;

    let boards = rank_all(records)
        .into_iter()
        .map(|mut board| {
            tracking::observe(&mut board.entries);
            LeaderboardResponse {
                circuit: board.circuit,
                entries: board.entries.iter().map(LeaderboardRow::from).collect(),
            }
        })
        .collect();

    Ok(Json(boards))
}

async fn recompute_circuit(
    State(state): State<AppState>,
    Path(circuit): Path<String>,
) -> Result<Json<RecomputeSummary>, ApiError> {
    match state.recomputer.recompute(&circuit).await {
        Ok(summary) => Ok(Json(summary)),
        Err(RecomputeError::UnknownCircuit(c)) => Err((
            StatusCode::NOT_FOUND,
            format!("No timing data for circuit {}", c),
        )),
        Err(e @ RecomputeError::Conflict { .. }) => {
            tracing::warn!("{}", e);
            Err((StatusCode::CONFLICT, format!("{}; retry the recompute", e)))
        }
        Err(RecomputeError::Store(e)) => Err(store_error(e)),
    }
}

// === Timing Intake ===

#[derive(Deserialize)]
struct NewTiming {
    vehicle_id: VehicleId,
    #[serde(default)]
    circuit: Option<String>,
    #[serde(default)]
    lane: Option<String>,
    #[serde(default)]
    laps: Option<u32>,
    #[serde(default)]
    best_lap_time: Option<String>,
    #[serde(default)]
    total_time: Option<String>,
    #[serde(default)]
    timing_date: Option<NaiveDate>,
    #[serde(default)]
    setup_snapshot: Option<serde_json::Value>,
}

async fn create_timing(
    State(state): State<AppState>,
    Json(request): Json<NewTiming>,
) -> Result<impl IntoResponse, ApiError> {
    if request.laps == Some(0) {
        return Err((StatusCode::BAD_REQUEST, "laps must be positive".to_string()));
    }

    for (field, value) in [
        ("best_lap_time", &request.best_lap_time),
        ("total_time", &request.total_time),
    ] {
        if laptime::parse_opt(value.as_deref()).is_infinite() {
            tracing::warn!(
                "Session for vehicle {} has unrankable {} {:?}",
                request.vehicle_id,
                field,
                value
            );
        }
    }

    let record = TimingRecord {
        id: 0,
        vehicle_id: request.vehicle_id,
        circuit: request.circuit,
        lane: request.lane,
        laps: request.laps,
        best_lap_time: request.best_lap_time,
        total_time: request.total_time,
        average_time: None,
        timing_date: request
            .timing_date
            .unwrap_or_else(|| Utc::now().date_naive()),
        current_position: None,
        previous_position: None,
        position_change: 0,
        position_updated_at: None,
        setup_snapshot: request.setup_snapshot,
    };

    let stored = state.store.insert_timing(record).map_err(store_error)?;
    tracing::info!(
        "Logged session {} for vehicle {} on {}",
        stored.id,
        stored.vehicle_id,
        stored.circuit.as_deref().unwrap_or("unassigned circuit")
    );

    Ok((StatusCode::CREATED, Json(stored)))
}

// === Competitions ===

#[derive(Deserialize)]
struct StandingsQuery {
    category: Option<CategoryId>,
}

/// One classification line, formatted for display
#[derive(Serialize)]
struct StandingRow {
    position: u32,
    participant_id: u64,
    driver_name: Option<String>,
    vehicle: Option<String>,
    category_id: Option<CategoryId>,
    points: u32,
    rounds_completed: u32,
    complete: bool,
    total_laps: u32,
    total_time: String,
    total_time_seconds: f64,
    best_lap_time: String,
    gap_to_leader: String,
    gap_to_previous: String,
}

impl From<&Standing> for StandingRow {
    fn from(s: &Standing) -> Self {
        Self {
            position: s.position,
            participant_id: s.participant_id,
            driver_name: s.driver_name.clone(),
            vehicle: s.vehicle.as_ref().map(|v| v.label()),
            category_id: s.category_id,
            points: s.points,
            rounds_completed: s.rounds_completed,
            complete: s.complete,
            total_laps: s.total_laps,
            total_time: display_seconds(s.total_time_seconds),
            total_time_seconds: s.total_time_seconds,
            best_lap_time: display_seconds(s.best_lap_seconds),
            gap_to_leader: format_gap(Some(s.gap_to_leader)),
            gap_to_previous: format_gap(Some(s.gap_to_previous)),
        }
    }
}

#[derive(Serialize)]
struct StandingsResponse {
    competition: Competition,
    category: Option<CategoryId>,
    standings: Vec<StandingRow>,
}

async fn competition_standings(
    State(state): State<AppState>,
    Path(id): Path<CompetitionId>,
    Query(query): Query<StandingsQuery>,
) -> Result<Json<StandingsResponse>, ApiError> {
    let snapshot = state.store.competition_snapshot(id).map_err(store_error)?;
    let rules: Vec<ScoringRule> = snapshot.rules.into_iter().map(|r| r.rule).collect();

    let standings = classify(
        &snapshot.competition,
        &snapshot.participants,
        &snapshot.timings,
        &rules,
        query.category,
    );

    Ok(Json(StandingsResponse {
        competition: snapshot.competition,
        category: query.category,
        standings: standings.iter().map(StandingRow::from).collect(),
    }))
}

async fn list_rules(
    State(state): State<AppState>,
    Path(id): Path<CompetitionId>,
) -> Result<Json<Vec<ScoringRuleRecord>>, ApiError> {
    let snapshot = state.store.competition_snapshot(id).map_err(store_error)?;
    Ok(Json(snapshot.rules))
}

#[derive(Deserialize)]
struct NewRule {
    #[serde(default)]
    name: Option<String>,
    #[serde(flatten)]
    rule: ScoringRule,
}

async fn create_rule(
    State(state): State<AppState>,
    Path(id): Path<CompetitionId>,
    Json(request): Json<NewRule>,
) -> Result<impl IntoResponse, ApiError> {
    let record = ScoringRuleRecord {
        id: 0,
        competition_id: Some(id),
        name: request.name,
        is_template: false,
        rule: request.rule,
    };

    let stored = state.store.insert_rule(id, record).map_err(store_error)?;
    tracing::info!("Added {} rule {} to competition {}", stored.rule.kind(), stored.id, id);
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn create_rule_from_template(
    State(state): State<AppState>,
    Path((id, template_id)): Path<(CompetitionId, u64)>,
) -> Result<impl IntoResponse, ApiError> {
    let template = state
        .store
        .rule_templates()
        .map_err(store_error)?
        .into_iter()
        .find(|t| t.id == template_id)
        .ok_or((
            StatusCode::NOT_FOUND,
            format!("Scoring template {} not found", template_id),
        ))?;

    let stored = state.store.insert_rule(id, template).map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn list_templates(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScoringRuleRecord>>, ApiError> {
    state.store.rule_templates().map(Json).map_err(store_error)
}

async fn create_competition_timing(
    State(state): State<AppState>,
    Path(id): Path<CompetitionId>,
    Json(timing): Json<CompetitionTiming>,
) -> Result<impl IntoResponse, ApiError> {
    if timing.penalty_seconds < 0.0 || !timing.penalty_seconds.is_finite() {
        return Err((
            StatusCode::BAD_REQUEST,
            "penalty_seconds must be zero or more".to_string(),
        ));
    }

    let participant = timing.participant_id;
    let round = timing.round_number;
    state
        .store
        .insert_competition_timing(id, timing)
        .map_err(store_error)?;

    tracing::info!(
        "Recorded round {} for participant {} in competition {}",
        round,
        participant,
        id
    );
    Ok(StatusCode::CREATED)
}
