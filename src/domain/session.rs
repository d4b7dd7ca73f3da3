//! Trading session bounds and minute-by-minute timestamp ranges.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::domain::error::SignalError;
use crate::domain::gann::truncate_to_minute;

pub const DEFAULT_OPEN: &str = "09:15";
pub const DEFAULT_CLOSE: &str = "15:30";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Session {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Result<Self, SignalError> {
        if open >= close {
            return Err(SignalError::invalid_input(
                "session",
                format!("open {} must be before close {}", open, close),
            ));
        }
        Ok(Self { open, close })
    }

    pub fn open_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.open)
    }

    /// Every minute from open to close inclusive on `date`.
    pub fn minutes_on(&self, date: NaiveDate) -> MinuteRange {
        MinuteRange::new_unchecked(date.and_time(self.open), date.and_time(self.close))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self {
            open: parse_clock(DEFAULT_OPEN).unwrap_or(NaiveTime::MIN),
            close: parse_clock(DEFAULT_CLOSE).unwrap_or(NaiveTime::MIN),
        }
    }
}

pub fn parse_clock(value: &str) -> Result<NaiveTime, SignalError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value.trim(), "%H:%M:%S"))
        .map_err(|_| SignalError::invalid_input(value.trim(), "expected HH:MM"))
}

pub fn parse_date(value: &str) -> Result<NaiveDate, SignalError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| SignalError::invalid_input(value.trim(), "expected YYYY-MM-DD"))
}

/// Accepts `YYYY-MM-DD HH:MM[:SS]` or the same with a `T` separator.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, SignalError> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    let s = value.trim();
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .ok_or_else(|| SignalError::invalid_input(s, "expected YYYY-MM-DD HH:MM[:SS]"))
}

/// Lazy, restartable sequence of one-minute timestamps, both ends inclusive.
/// Iteration stops at the last representable minute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinuteRange {
    start: NaiveDateTime,
    next: Option<NaiveDateTime>,
    end: NaiveDateTime,
}

impl MinuteRange {
    /// Fails with `InvalidInput` when the range is empty.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, SignalError> {
        let start = truncate_to_minute(start);
        let end = truncate_to_minute(end);
        if start > end {
            return Err(SignalError::invalid_input(
                "range",
                format!("start {} is after end {}", start, end),
            ));
        }
        Ok(Self::new_unchecked(start, end))
    }

    fn new_unchecked(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let start = truncate_to_minute(start);
        Self {
            start,
            next: Some(start),
            end: truncate_to_minute(end),
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }
}

impl Iterator for MinuteRange {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.filter(|t| *t <= self.end)?;
        self.next = current.checked_add_signed(Duration::minutes(1));
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next {
            Some(next) if next <= self.end => ((self.end - next).num_minutes() + 1) as usize,
            _ => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for MinuteRange {}
