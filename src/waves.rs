use std::collections::HashMap;

use crate::types::{Team, Wave, WaveView};

pub const WAVE_SIZE: usize = 3;

/// Chunk teams, in the order given, into waves of up to `WAVE_SIZE`.
pub fn schedule_waves(teams: &[Team]) -> Vec<Wave> {
    teams
        .chunks(WAVE_SIZE)
        .zip(1u32..)
        .map(|(chunk, wave_id)| Wave {
            wave_id,
            team_ids: chunk.iter().map(|t| t.team_id).collect(),
        })
        .collect()
}

/// Resolve each wave's team ids against the current team set, skipping ids
/// that no longer exist.
pub fn expand_waves(waves: &[Wave], teams: &[Team]) -> Vec<WaveView> {
    let by_id: HashMap<u32, &Team> = teams.iter().map(|t| (t.team_id, t)).collect();
    waves
        .iter()
        .map(|wave| WaveView {
            wave_id: wave.wave_id,
            team_ids: wave.team_ids.clone(),
            teams: wave
                .team_ids
                .iter()
                .filter_map(|id| by_id.get(id).map(|t| (*t).clone()))
                .collect(),
        })
        .collect()
}
