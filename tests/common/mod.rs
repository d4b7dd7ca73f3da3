#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use gannastro::domain::body::Body;
use gannastro::domain::error::SignalError;
use gannastro::domain::sample::PriceSample;
use gannastro::ports::data_port::DataPort;
use gannastro::ports::ephemeris_port::EphemerisPort;
use std::collections::HashMap;
use std::io::Write;

/// Ephemeris with a fixed longitude per body plus an optional per-minute drift,
/// failing at chosen instants.
pub struct FixedEphemeris {
    pub longitudes: HashMap<Body, f64>,
    pub drift_per_minute: HashMap<Body, f64>,
    pub epoch: NaiveDateTime,
    pub fail_at: Vec<NaiveDateTime>,
}

impl FixedEphemeris {
    pub fn new(longitudes: &[(Body, f64)]) -> Self {
        Self {
            longitudes: longitudes.iter().copied().collect(),
            drift_per_minute: HashMap::new(),
            epoch: ts(2024, 1, 2, 9, 15),
            fail_at: Vec::new(),
        }
    }

    pub fn with_drift(mut self, body: Body, degrees_per_minute: f64) -> Self {
        self.drift_per_minute.insert(body, degrees_per_minute);
        self
    }

    pub fn failing_at(mut self, at: NaiveDateTime) -> Self {
        self.fail_at.push(at);
        self
    }
}

impl EphemerisPort for FixedEphemeris {
    fn longitude(&self, at: NaiveDateTime, body: Body) -> Result<f64, SignalError> {
        if self.fail_at.contains(&at) {
            return Err(SignalError::PositionUnavailable {
                timestamp: at,
                body,
                reason: "mock failure".into(),
            });
        }
        let base = self.longitudes.get(&body).copied().unwrap_or(0.0);
        let drift = self.drift_per_minute.get(&body).copied().unwrap_or(0.0);
        let minutes = (at - self.epoch).num_minutes() as f64;
        Ok((base + drift * minutes).rem_euclid(360.0))
    }
}

pub struct MockDataPort {
    pub samples: Vec<PriceSample>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new(samples: Vec<PriceSample>) -> Self {
        Self {
            samples,
            error: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            samples: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_samples(&self) -> Result<Vec<PriceSample>, SignalError> {
        if let Some(reason) = &self.error {
            return Err(SignalError::invalid_input("mock", reason.clone()));
        }
        Ok(self.samples.clone())
    }
}

pub fn ts(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// `count` one-minute samples starting at `start`, values `base`, `base + 1`, ...
pub fn minute_samples(start: NaiveDateTime, count: usize, base: f64) -> Vec<PriceSample> {
    (0..count)
        .map(|i| PriceSample {
            timestamp: start + chrono::Duration::minutes(i as i64),
            value: base + i as f64,
            row: i + 2,
        })
        .collect()
}

pub fn samples_csv(samples: &[PriceSample]) -> String {
    let mut out = String::from("Datetime,Open,Close\n");
    for s in samples {
        out.push_str(&format!(
            "{},{},{}\n",
            s.timestamp.format("%Y-%m-%d %H:%M:%S"),
            s.value - 0.5,
            s.value
        ));
    }
    out
}

pub fn write_temp_file(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
