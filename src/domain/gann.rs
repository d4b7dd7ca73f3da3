//! Gann timing checkpoints.
//!
//! A schedule is either elapsed-minute offsets from a session start or literal
//! clock times on the session's date. Membership compares timestamps after
//! truncating to the minute, so 09:45:30 is a member of a 09:45 checkpoint and
//! 09:46:00 is not.

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use std::collections::BTreeSet;
use std::fmt;

pub const DEFAULT_OFFSETS: [i64; 7] = [30, 60, 90, 120, 150, 180, 210];

/// Largest accepted offset: one week of minutes.
pub const MAX_OFFSET_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GannSchedule {
    /// Minutes elapsed since the session start.
    Offsets(Vec<i64>),
    /// Clock times on the session start's date.
    TimesOfDay(Vec<NaiveTime>),
}

impl GannSchedule {
    pub fn default_offsets() -> Self {
        GannSchedule::Offsets(DEFAULT_OFFSETS.to_vec())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            GannSchedule::Offsets(v) => v.is_empty(),
            GannSchedule::TimesOfDay(v) => v.is_empty(),
        }
    }

    /// Parse a comma list of minute offsets. Empty input is an empty schedule.
    pub fn parse_offsets(list: &str) -> Result<Self, String> {
        let mut offsets = Vec::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let minutes: i64 = item
                .parse()
                .map_err(|_| format!("'{}' is not a whole number of minutes", item))?;
            if minutes < 0 {
                return Err(format!("offset {} must not be negative", minutes));
            }
            if minutes > MAX_OFFSET_MINUTES {
                return Err(format!(
                    "offset {} exceeds {} minutes",
                    minutes, MAX_OFFSET_MINUTES
                ));
            }
            offsets.push(minutes);
        }
        Ok(GannSchedule::Offsets(offsets))
    }

    /// Parse a comma list of `HH:MM` clock times. Empty input is an empty schedule.
    pub fn parse_times(list: &str) -> Result<Self, String> {
        let mut times = Vec::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let time = NaiveTime::parse_from_str(item, "%H:%M")
                .map_err(|_| format!("'{}' is not an HH:MM time", item))?;
            times.push(time);
        }
        Ok(GannSchedule::TimesOfDay(times))
    }
}

impl fmt::Display for GannSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GannSchedule::Offsets(v) => {
                let items: Vec<String> = v.iter().map(|m| format!("+{}m", m)).collect();
                write!(f, "offsets [{}]", items.join(", "))
            }
            GannSchedule::TimesOfDay(v) => {
                let items: Vec<String> = v.iter().map(|t| t.format("%H:%M").to_string()).collect();
                write!(f, "times [{}]", items.join(", "))
            }
        }
    }
}

/// Drop seconds and sub-second precision.
pub fn truncate_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// The checkpoint instants a schedule yields for one session start.
///
/// Offsets that land outside the representable calendar are dropped.
pub fn checkpoints(session_start: NaiveDateTime, schedule: &GannSchedule) -> BTreeSet<NaiveDateTime> {
    let start = truncate_to_minute(session_start);
    match schedule {
        GannSchedule::Offsets(offsets) => offsets
            .iter()
            .filter_map(|&m| Duration::try_minutes(m))
            .filter_map(|d| start.checked_add_signed(d))
            .collect(),
        GannSchedule::TimesOfDay(times) => times
            .iter()
            .map(|&t| start.date().and_time(t))
            .map(truncate_to_minute)
            .collect(),
    }
}

pub fn is_checkpoint(ts: NaiveDateTime, set: &BTreeSet<NaiveDateTime>) -> bool {
    set.contains(&truncate_to_minute(ts))
}
