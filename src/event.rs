use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::error::{RaceError, StoreError};
use crate::leaderboard::compute_leaderboard;
use crate::stations::{parse_clock, StationCatalog};
use crate::store::{Collection, EventStore};
use crate::teams::{form_teams, validate_members, FormationMode};
use crate::types::{
    ActivePatch, ActivePointer, LeaderboardSnapshot, Participant, RosterSummary, StationTime, Team, Wave,
    WaveView,
};
use crate::waves::{expand_waves, schedule_waves};

const ACTIVE_KEY: &str = "active";

pub type SharedRaceEvent = Arc<RaceEvent>;

/// One race event: the engines wired to the document store.
///
/// Operations run to completion one at a time against the store. A team
/// regeneration racing a time submission can still record a time against a
/// team id from the discarded generation.
pub struct RaceEvent {
    store: Arc<dyn EventStore>,
    stations: StationCatalog,
    rng: Mutex<ChaCha8Rng>,
}

impl RaceEvent {
    pub fn new(store: Arc<dyn EventStore>, stations: StationCatalog, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        RaceEvent {
            store,
            stations,
            rng: Mutex::new(rng),
        }
    }

    pub fn stations(&self) -> &StationCatalog {
        &self.stations
    }

    // ── Roster ─────────────────────────────────────────────────────────

    /// Replace the roster. Teams, waves and the active pointer go with it.
    pub fn import_roster(&self, participants: Vec<Participant>) -> Result<RosterSummary, RaceError> {
        if participants.is_empty() {
            return Err(RaceError::NoValidParticipants);
        }
        let summary = RosterSummary::from_participants(&participants);
        self.store.replace_many(vec![
            (Collection::Participants, encode_all(&participants)?),
            (Collection::Teams, Vec::new()),
            (Collection::Waves, Vec::new()),
            (Collection::Settings, Vec::new()),
        ])?;
        info!(
            "Imported roster: {} participants ({} M / {} F)",
            summary.total, summary.males, summary.females
        );
        Ok(summary)
    }

    pub fn roster(&self) -> Result<Vec<Participant>, RaceError> {
        Ok(decode_all(self.store.find_all(Collection::Participants)?)?)
    }

    // ── Teams & waves ──────────────────────────────────────────────────

    /// Regenerate every team and wave from the stored roster.
    ///
    /// Teams and waves are built in memory and committed together with a
    /// cleared active pointer; on error nothing is written.
    pub fn form_teams(&self, mode: FormationMode) -> Result<(Vec<Team>, Vec<Wave>), RaceError> {
        let participants = self.roster()?;
        let teams = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            form_teams(&participants, mode, &mut *rng)?
        };
        let waves = schedule_waves(&teams);

        self.store.replace_many(vec![
            (Collection::Teams, encode_all(&teams)?),
            (Collection::Waves, encode_all(&waves)?),
            (Collection::Settings, Vec::new()),
        ])?;
        info!(
            "Generated {} teams in {} waves ({} mode, {} participants)",
            teams.len(),
            waves.len(),
            mode.as_str(),
            participants.len()
        );
        Ok((teams, waves))
    }

    pub fn teams(&self) -> Result<Vec<Team>, RaceError> {
        Ok(decode_all(self.store.find_all(Collection::Teams)?)?)
    }

    pub fn waves(&self) -> Result<Vec<Wave>, RaceError> {
        Ok(decode_all(self.store.find_all(Collection::Waves)?)?)
    }

    pub fn wave_views(&self) -> Result<Vec<WaveView>, RaceError> {
        Ok(expand_waves(&self.waves()?, &self.teams()?))
    }

    /// Swap a team's members by hand. Recorded times stay with the team.
    pub fn edit_team(&self, team_id: u32, members: Vec<Participant>) -> Result<Team, RaceError> {
        validate_members(&members)?;
        let key = json!(team_id);
        let doc = self
            .store
            .find_one(Collection::Teams, &key)?
            .ok_or(RaceError::TeamNotFound(team_id))?;
        let mut team: Team = serde_json::from_value(doc).map_err(StoreError::from)?;

        let written = self.store.upsert_field(
            Collection::Teams,
            &key,
            &["members"],
            serde_json::to_value(&members).map_err(StoreError::from)?,
            false,
        )?;
        if !written {
            return Err(RaceError::TeamNotFound(team_id));
        }
        info!("Edited team {team_id}: {} members", members.len());
        team.members = members;
        Ok(team)
    }

    // ── Times ──────────────────────────────────────────────────────────

    /// Record (or overwrite) a team's time at a station.
    pub fn record_time(&self, team_id: u32, station: &str, time_str: &str) -> Result<StationTime, RaceError> {
        self.stations.validate(station)?;
        let total_seconds = parse_clock(time_str)?;
        let time = StationTime {
            time_str: time_str.to_string(),
            total_seconds,
        };

        let written = self.store.upsert_field(
            Collection::Teams,
            &json!(team_id),
            &["station_times", station],
            serde_json::to_value(&time).map_err(StoreError::from)?,
            false,
        )?;
        if !written {
            return Err(RaceError::TeamNotFound(team_id));
        }
        info!("Saved {time_str} for team {team_id} at {station}");
        Ok(time)
    }

    // ── Active pointer ─────────────────────────────────────────────────

    pub fn active(&self) -> Result<ActivePointer, RaceError> {
        let doc = self.store.find_one(Collection::Settings, &json!(ACTIVE_KEY))?;
        match doc {
            Some(doc) => Ok(serde_json::from_value(doc).map_err(StoreError::from)?),
            None => Ok(ActivePointer::default()),
        }
    }

    /// Merge-patch: only the fields present in `patch` are overwritten.
    pub fn set_active(&self, patch: ActivePatch) -> Result<ActivePointer, RaceError> {
        let key = json!(ACTIVE_KEY);
        if let Some(wave_id) = patch.wave_id {
            self.store
                .upsert_field(Collection::Settings, &key, &["active_wave_id"], json!(wave_id), true)?;
        }
        if let Some(station) = &patch.station {
            self.store
                .upsert_field(Collection::Settings, &key, &["active_station"], json!(station), true)?;
        }
        let active = self.active()?;
        if patch.is_empty() {
            debug!("Empty active patch, nothing changed");
        } else {
            info!(
                "Active pointer now wave {:?}, station {:?}",
                active.active_wave_id, active.active_station
            );
        }
        Ok(active)
    }

    // ── Leaderboard ────────────────────────────────────────────────────

    pub fn leaderboard(&self) -> Result<LeaderboardSnapshot, RaceError> {
        let teams = self.teams()?;
        let waves = self.waves()?;
        let active = self.active()?;
        let leaderboard = compute_leaderboard(&teams, &waves, &active, &self.stations);
        Ok(LeaderboardSnapshot {
            leaderboard,
            active_wave_id: active.active_wave_id,
            active_station: active.active_station,
            stations: self.stations.names().to_vec(),
        })
    }

    pub fn reset(&self) -> Result<(), RaceError> {
        self.store.replace_many(
            Collection::ALL
                .iter()
                .map(|&collection| (collection, Vec::new()))
                .collect(),
        )?;
        info!("All event data reset");
        Ok(())
    }
}

fn encode_all<T: Serialize>(items: &[T]) -> Result<Vec<Value>, StoreError> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).map_err(StoreError::from))
        .collect()
}

fn decode_all<T: DeserializeOwned>(docs: Vec<Value>) -> Result<Vec<T>, StoreError> {
    docs.into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
        .collect()
}
