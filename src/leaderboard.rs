use std::collections::{HashMap, HashSet};

use crate::stations::{format_clock, StationCatalog};
use crate::types::{ActivePointer, LeaderboardEntry, Team, Wave};

/// Rank every team by cumulative time.
///
/// Timed teams come first, fastest first, ties kept in team id order. Teams
/// with nothing recorded follow in team id order. Ranks run 1..N over that
/// single merged ordering.
pub fn compute_leaderboard(
    teams: &[Team],
    waves: &[Wave],
    active: &ActivePointer,
    stations: &StationCatalog,
) -> Vec<LeaderboardEntry> {
    let mut team_waves: HashMap<u32, u32> = HashMap::new();
    let mut active_ids: HashSet<u32> = HashSet::new();
    for wave in waves {
        for &team_id in &wave.team_ids {
            team_waves.insert(team_id, wave.wave_id);
        }
        if active.active_wave_id == Some(wave.wave_id) {
            active_ids = wave.team_ids.iter().copied().collect();
        }
    }

    let (mut timed, mut untimed): (Vec<LeaderboardEntry>, Vec<LeaderboardEntry>) = teams
        .iter()
        .map(|team| {
            build_entry(
                team,
                stations,
                team_waves.get(&team.team_id).copied(),
                active_ids.contains(&team.team_id),
            )
        })
        .partition(|entry| entry.total_seconds > 0);

    timed.sort_by_key(|entry| (entry.total_seconds, entry.team_id));
    untimed.sort_by_key(|entry| entry.team_id);

    timed
        .into_iter()
        .chain(untimed)
        .zip(1usize..)
        .map(|(mut entry, rank)| {
            entry.rank = rank;
            entry
        })
        .collect()
}

fn build_entry(team: &Team, stations: &StationCatalog, wave_id: Option<u32>, is_active: bool) -> LeaderboardEntry {
    // Only catalog stations count toward progress and total.
    let recorded: Vec<u64> = stations
        .names()
        .iter()
        .filter_map(|name| team.station_times.get(name))
        .map(|time| u64::from(time.total_seconds))
        .collect();
    let total_seconds: u64 = recorded.iter().sum();

    LeaderboardEntry {
        team_id: team.team_id,
        members: team.members.clone(),
        station_times: team.station_times.clone(),
        current_station: stations.progress_label(recorded.len()),
        total_seconds,
        total_time_str: format_clock(total_seconds),
        completed_stations: recorded.len(),
        is_active,
        wave_id,
        rank: 0,
    }
}
