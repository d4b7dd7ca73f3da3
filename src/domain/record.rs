//! Per-timestamp output records and run summaries.

use chrono::NaiveDateTime;

use crate::domain::aspect::AspectMatch;
use crate::domain::body::{Body, BodyPosition, ZodiacSign};
use crate::domain::signal::Signal;

/// One evaluated timestamp. Immutable once emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRecord {
    pub timestamp: NaiveDateTime,
    /// One entry per configured body, in configured order. Empty when
    /// incomplete.
    pub positions: Vec<BodyPosition>,
    pub aspects: Vec<AspectMatch>,
    pub is_gann_checkpoint: bool,
    pub signal: Signal,
    /// Caller-supplied sample carried through unchanged (backtest mode).
    pub sample: Option<f64>,
    /// False when the ephemeris could not resolve every body.
    pub complete: bool,
}

impl SignalRecord {
    pub fn longitude(&self, body: Body) -> Option<f64> {
        self.positions
            .iter()
            .find(|p| p.body == body)
            .map(|p| p.longitude)
    }

    pub fn sign(&self, body: Body) -> Option<ZodiacSign> {
        self.longitude(body).map(ZodiacSign::from_longitude)
    }
}

/// A timestamp dropped or flagged because a position was unavailable.
#[derive(Debug, Clone, PartialEq)]
pub struct Skip {
    pub timestamp: NaiveDateTime,
    pub body: Option<Body>,
    /// Source row, when the timestamp came from an input table.
    pub row: Option<usize>,
    pub reason: String,
}

/// A finished run: ordered records plus every skipped timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalRun {
    pub records: Vec<SignalRecord>,
    pub skips: Vec<Skip>,
}

impl SignalRun {
    pub fn skipped(&self) -> usize {
        self.skips.len()
    }

    pub fn count(&self, signal: Signal) -> usize {
        self.records.iter().filter(|r| r.signal == signal).count()
    }

    pub fn checkpoint_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_gann_checkpoint).count()
    }

    /// Records carrying anything other than HOLD.
    pub fn actionable(&self) -> impl Iterator<Item = &SignalRecord> {
        self.records.iter().filter(|r| r.signal.is_actionable())
    }
}

/// Tallies of a run whose records were written out as they were produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub records: usize,
    pub rows_written: usize,
    pub checkpoints: usize,
    signals: [usize; Signal::ALL.len()],
    pub skips: Vec<Skip>,
}

impl RunSummary {
    pub fn observe(&mut self, record: &SignalRecord) {
        self.records += 1;
        if record.is_gann_checkpoint {
            self.checkpoints += 1;
        }
        if let Some(i) = Signal::ALL.iter().position(|s| *s == record.signal) {
            self.signals[i] += 1;
        }
    }

    pub fn count(&self, signal: Signal) -> usize {
        Signal::ALL
            .iter()
            .position(|s| *s == signal)
            .map_or(0, |i| self.signals[i])
    }

    /// Records carrying anything other than HOLD.
    pub fn actionable(&self) -> usize {
        Signal::ALL
            .iter()
            .filter(|s| s.is_actionable())
            .map(|&s| self.count(s))
            .sum()
    }

    pub fn skipped(&self) -> usize {
        self.skips.len()
    }
}
