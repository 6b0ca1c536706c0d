use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::auth::TokenRegistry;

// ── Shared state aliases ───────────────────────────────────────────────

pub type SharedTokenRegistry = Arc<Mutex<TokenRegistry>>;

// ── Roster ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    M,
    F,
}

impl Gender {
    /// Accepts `m`/`f` in any case, surrounding whitespace ignored.
    pub fn parse(raw: &str) -> Option<Gender> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "M" => Some(Gender::M),
            "F" => Some(Gender::F),
            _ => None,
        }
    }
}

/// A roster entry. Teams hold copies of these, never references.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub gender: Gender,
}

impl Participant {
    pub fn new(name: impl Into<String>, gender: Gender) -> Self {
        Participant { name: name.into(), gender }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RosterSummary {
    pub total: usize,
    pub males: usize,
    pub females: usize,
}

impl RosterSummary {
    pub fn from_participants(participants: &[Participant]) -> Self {
        let males = participants.iter().filter(|p| p.gender == Gender::M).count();
        RosterSummary {
            total: participants.len(),
            males,
            females: participants.len() - males,
        }
    }
}

// ── Teams & waves ──────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationTime {
    pub time_str: String,
    pub total_seconds: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_id: u32,
    pub members: Vec<Participant>,
    /// Keyed by the exact station name; absent keys are unrecorded.
    #[serde(default)]
    pub station_times: BTreeMap<String, StationTime>,
}

impl Team {
    pub fn new(team_id: u32, members: Vec<Participant>) -> Self {
        Team {
            team_id,
            members,
            station_times: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wave {
    pub wave_id: u32,
    pub team_ids: Vec<u32>,
}

/// A wave with its team documents resolved, as served to the admin panel.
#[derive(Clone, Debug, Serialize)]
pub struct WaveView {
    pub wave_id: u32,
    pub team_ids: Vec<u32>,
    pub teams: Vec<Team>,
}

// ── Active pointer ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePointer {
    #[serde(default)]
    pub active_wave_id: Option<u32>,
    #[serde(default)]
    pub active_station: Option<String>,
}

/// Merge-patch for the active pointer: `None` leaves the stored value alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ActivePatch {
    #[serde(default)]
    pub wave_id: Option<u32>,
    #[serde(default)]
    pub station: Option<String>,
}

impl ActivePatch {
    pub fn is_empty(&self) -> bool {
        self.wave_id.is_none() && self.station.is_none()
    }
}

// ── Leaderboard ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub team_id: u32,
    pub members: Vec<Participant>,
    pub station_times: BTreeMap<String, StationTime>,
    pub current_station: String,
    pub total_seconds: u64,
    pub total_time_str: String,
    pub completed_stations: usize,
    pub is_active: bool,
    pub wave_id: Option<u32>,
    pub rank: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct LeaderboardSnapshot {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub active_wave_id: Option<u32>,
    pub active_station: Option<String>,
    pub stations: Vec<String>,
}

// ── Request payloads ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateTeamsRequest {
    pub mode: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveTimeRequest {
    pub team_id: u32,
    pub station: String,
    pub time_str: String,
}

#[derive(Debug, Deserialize)]
pub struct EditTeamRequest {
    pub members: Vec<Participant>,
}
