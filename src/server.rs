use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderValue, Method},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::auth::{check_credentials, AdminSession, TokenRegistry};
use crate::config::AppConfig;
use crate::error::RaceError;
use crate::event::{RaceEvent, SharedRaceEvent};
use crate::roster::parse_roster_csv;
use crate::store::EventStore;
use crate::teams::FormationMode;
use crate::types::{
    ActivePatch, EditTeamRequest, GenerateTeamsRequest, LoginRequest, RosterSummary, SaveTimeRequest,
    SharedTokenRegistry,
};

#[derive(Clone)]
pub struct AppState {
    pub event: SharedRaceEvent,
    pub tokens: SharedTokenRegistry,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn EventStore>) -> Self {
        let event = RaceEvent::new(store, config.station_catalog(), config.shuffle_seed);
        AppState {
            event: Arc::new(event),
            tokens: Arc::new(Mutex::new(TokenRegistry::new(config.token_ttl_secs))),
            config: Arc::new(config),
        }
    }
}

type ApiResult = Result<Json<Value>, RaceError>;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/login", post(login))
        .route("/participants/upload", post(upload_participants))
        .route("/participants/summary", get(participants_summary))
        .route("/teams/generate", post(generate_teams))
        .route("/teams", get(list_teams))
        .route("/teams/:team_id", put(edit_team))
        .route("/waves", get(list_waves))
        .route("/times/save", post(save_time))
        .route("/settings/active", get(get_active).put(set_active))
        .route("/leaderboard", get(get_leaderboard))
        .route("/stations", get(get_stations))
        .route("/reset", post(reset_data));

    let cors = cors_layer(&state.config.cors_origins);
    Router::new()
        .nest("/api", api)
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Ignoring CORS origin {o:?}: {e}");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(60 * 60))
}

// ── Auth ───────────────────────────────────────────────────────────────

async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult {
    if let Err(e) = check_credentials(&state.config, &req.username, &req.password) {
        warn!("Failed login for {:?}: {e}", req.username);
        return Err(e.into());
    }
    let token = {
        let mut registry = state.tokens.lock().unwrap_or_else(|e| e.into_inner());
        registry.issue(&req.username, Utc::now(), &mut rand::thread_rng())
    };
    info!("Admin {} logged in", req.username);
    Ok(Json(json!({ "token": token, "username": req.username })))
}

// ── Participants ───────────────────────────────────────────────────────

async fn upload_participants(
    _admin: AdminSession,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult {
    let mut upload: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RaceError::MalformedUpload(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| RaceError::MalformedUpload(e.to_string()))?;
        let text = String::from_utf8(bytes.to_vec()).map_err(|e| RaceError::MalformedUpload(e.to_string()))?;
        upload = Some(text);
        break;
    }
    let text = upload.ok_or_else(|| RaceError::MalformedUpload("missing \"file\" field".to_string()))?;

    let participants = parse_roster_csv(&text)?;
    let summary = state.event.import_roster(participants)?;
    Ok(Json(json!({
        "total": summary.total,
        "males": summary.males,
        "females": summary.females,
        "message": format!("Uploaded {} participants", summary.total),
    })))
}

async fn participants_summary(State(state): State<AppState>) -> ApiResult {
    let participants = state.event.roster()?;
    let summary = RosterSummary::from_participants(&participants);
    Ok(Json(json!({
        "total": summary.total,
        "males": summary.males,
        "females": summary.females,
        "participants": participants,
    })))
}

// ── Teams & waves ──────────────────────────────────────────────────────

async fn generate_teams(
    _admin: AdminSession,
    State(state): State<AppState>,
    Json(req): Json<GenerateTeamsRequest>,
) -> ApiResult {
    let mode: FormationMode = req.mode.parse()?;
    let (teams, waves) = state.event.form_teams(mode)?;
    Ok(Json(json!({
        "teams_count": teams.len(),
        "waves_count": waves.len(),
        "message": format!("Generated {} teams in {} waves", teams.len(), waves.len()),
    })))
}

async fn list_teams(State(state): State<AppState>) -> ApiResult {
    Ok(Json(json!({ "teams": state.event.teams()? })))
}

async fn edit_team(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(team_id): Path<u32>,
    Json(req): Json<EditTeamRequest>,
) -> ApiResult {
    let team = state.event.edit_team(team_id, req.members)?;
    Ok(Json(json!({ "team": team, "message": format!("Updated Team {team_id}") })))
}

async fn list_waves(State(state): State<AppState>) -> ApiResult {
    Ok(Json(json!({ "waves": state.event.wave_views()? })))
}

// ── Times ──────────────────────────────────────────────────────────────

async fn save_time(
    _admin: AdminSession,
    State(state): State<AppState>,
    Json(req): Json<SaveTimeRequest>,
) -> ApiResult {
    let time = state.event.record_time(req.team_id, &req.station, &req.time_str)?;
    Ok(Json(json!({
        "total_seconds": time.total_seconds,
        "message": format!("Saved {} for Team {} at {}", req.time_str, req.team_id, req.station),
    })))
}

// ── Settings ───────────────────────────────────────────────────────────

async fn get_active(State(state): State<AppState>) -> ApiResult {
    Ok(Json(json!(state.event.active()?)))
}

async fn set_active(
    _admin: AdminSession,
    State(state): State<AppState>,
    Json(patch): Json<ActivePatch>,
) -> ApiResult {
    let active = state.event.set_active(patch)?;
    Ok(Json(json!({
        "active_wave_id": active.active_wave_id,
        "active_station": active.active_station,
        "message": "Active settings updated",
    })))
}

// ── Leaderboard ────────────────────────────────────────────────────────

async fn get_leaderboard(State(state): State<AppState>) -> ApiResult {
    Ok(Json(json!(state.event.leaderboard()?)))
}

async fn get_stations(State(state): State<AppState>) -> ApiResult {
    Ok(Json(json!({ "stations": state.event.stations() })))
}

async fn reset_data(admin: AdminSession, State(state): State<AppState>) -> ApiResult {
    state.event.reset()?;
    info!("Reset requested by {}", admin.username);
    Ok(Json(json!({ "message": "All data reset" })))
}

// ── Shutdown ───────────────────────────────────────────────────────────

pub async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
