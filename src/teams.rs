use rand::seq::SliceRandom;
use rand::Rng;
use std::str::FromStr;

use crate::error::RaceError;
use crate::types::{Gender, Participant, Team};

pub const TEAM_SIZE: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormationMode {
    /// Two men and one woman per team while both pools last.
    Constrained,
    Random,
}

impl FromStr for FormationMode {
    type Err = RaceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "2m1f" | "constrained" => Ok(FormationMode::Constrained),
            "random" => Ok(FormationMode::Random),
            _ => Err(RaceError::InvalidMode(raw.to_string())),
        }
    }
}

impl FormationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormationMode::Constrained => "2m1f",
            FormationMode::Random => "random",
        }
    }
}

/// Partition the roster into teams numbered from 1 in creation order.
///
/// The roster is copied into owned pools that are shuffled with `rng` and
/// drained from the back. Nobody is dropped: a remainder of one or two
/// people becomes a final undersized team.
pub fn form_teams<R: Rng + ?Sized>(
    participants: &[Participant],
    mode: FormationMode,
    rng: &mut R,
) -> Result<Vec<Team>, RaceError> {
    if participants.is_empty() {
        return Err(RaceError::EmptyRoster);
    }

    let groups = match mode {
        FormationMode::Constrained => constrained_groups(participants, rng),
        FormationMode::Random => {
            let mut pool = participants.to_vec();
            pool.shuffle(rng);
            drain_into_groups(pool)
        }
    };

    Ok(groups
        .into_iter()
        .zip(1u32..)
        .map(|(members, team_id)| Team::new(team_id, members))
        .collect())
}

fn constrained_groups<R: Rng + ?Sized>(participants: &[Participant], rng: &mut R) -> Vec<Vec<Participant>> {
    let (mut males, mut females): (Vec<Participant>, Vec<Participant>) = participants
        .iter()
        .cloned()
        .partition(|p| p.gender == Gender::M);
    males.shuffle(rng);
    females.shuffle(rng);

    let mut groups = Vec::new();
    while males.len() >= 2 && !females.is_empty() {
        let mut members = take_tail(&mut males, 2);
        members.extend(take_tail(&mut females, 1));
        groups.push(members);
    }

    // Whatever did not fit the 2M/1F shape is mixed without constraint.
    let mut leftover = males;
    leftover.append(&mut females);
    leftover.shuffle(rng);
    groups.extend(drain_into_groups(leftover));
    groups
}

/// Pop groups of `TEAM_SIZE` until empty; the last group may be short.
fn drain_into_groups(mut pool: Vec<Participant>) -> Vec<Vec<Participant>> {
    let mut groups = Vec::with_capacity(pool.len().div_ceil(TEAM_SIZE));
    while !pool.is_empty() {
        groups.push(take_tail(&mut pool, TEAM_SIZE));
    }
    groups
}

/// Remove up to `n` items from the back, in pop order.
fn take_tail(pool: &mut Vec<Participant>, n: usize) -> Vec<Participant> {
    let at = pool.len().saturating_sub(n);
    let mut tail = pool.split_off(at);
    tail.reverse();
    tail
}

/// Members supplied by hand when a team is edited.
pub fn validate_members(members: &[Participant]) -> Result<(), RaceError> {
    if members.is_empty() || members.len() > TEAM_SIZE {
        return Err(RaceError::InvalidTeamSize(members.len()));
    }
    Ok(())
}
