use serde::Serialize;

use crate::error::RaceError;

pub const DEFAULT_STATIONS: [&str; 6] = [
    "Row 750m",
    "Farmers carry 24kg/16kg - 60m",
    "Ski 750m",
    "Broad burpee jumps 40m",
    "Assault bike - 90cal",
    "Body weight lunges 40m",
];

pub const NOT_STARTED: &str = "Not Started";
pub const FINISHED: &str = "Finished";
pub const NO_TIME: &str = "--:--";

/// Ordered race route. Names are matched verbatim against recorded times.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StationCatalog {
    names: Vec<String>,
}

impl Default for StationCatalog {
    fn default() -> Self {
        StationCatalog::new(DEFAULT_STATIONS.iter().map(|s| s.to_string()).collect())
    }
}

impl StationCatalog {
    pub fn new(names: Vec<String>) -> Self {
        StationCatalog { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, station: &str) -> bool {
        self.names.iter().any(|name| name == station)
    }

    pub fn validate(&self, station: &str) -> Result<(), RaceError> {
        if self.contains(station) {
            Ok(())
        } else {
            Err(RaceError::InvalidStation(station.to_string()))
        }
    }

    /// Label for a team that has recorded `completed` stations. Assumes the
    /// route is run in catalog order; only the count is looked at.
    pub fn progress_label(&self, completed: usize) -> String {
        if completed == 0 {
            NOT_STARTED.to_string()
        } else if completed >= self.names.len() {
            FINISHED.to_string()
        } else {
            self.names[completed].clone()
        }
    }
}

/// Parse a stopwatch reading `MM:SS` into seconds.
///
/// Minutes are unbounded but must be non-negative, seconds must be within
/// `0..=59`. Single-digit parts are fine (`5:5` is 305 seconds).
pub fn parse_clock(raw: &str) -> Result<u32, RaceError> {
    let invalid = || RaceError::InvalidTimeFormat(raw.to_string());
    let (minutes, seconds) = raw.split_once(':').ok_or_else(invalid)?;
    if seconds.contains(':') {
        return Err(invalid());
    }
    let minutes: i64 = minutes.trim().parse().map_err(|_| invalid())?;
    let seconds: i64 = seconds.trim().parse().map_err(|_| invalid())?;
    if minutes < 0 || !(0..=59).contains(&seconds) {
        return Err(invalid());
    }
    minutes
        .checked_mul(60)
        .and_then(|m| m.checked_add(seconds))
        .and_then(|total| u32::try_from(total).ok())
        .ok_or_else(invalid)
}

/// Zero-padded `MM:SS`; minutes grow past two digits. Zero reads as `--:--`.
pub fn format_clock(total_seconds: u64) -> String {
    if total_seconds == 0 {
        return NO_TIME.to_string();
    }
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
