//! Forecast and backtest driver.
//!
//! The driver turns a timestamp sequence into signal records. Each timestamp
//! goes through the same pipeline: ephemeris positions, aspect detection, Gann
//! membership, signal synthesis. Records never depend on one another, so the
//! sequence can be consumed lazily through [`SignalStream`] or evaluated on the
//! rayon pool with [`Driver::run_parallel`]; both produce identical output in
//! input order.

use chrono::{NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::domain::aspect::{self, AspectConfig, BodyPair, DEFAULT_ORB};
use crate::domain::body::{Body, BodyPosition, ZodiacSign, longitude_of};
use crate::domain::error::SignalError;
use crate::domain::gann::{self, GannSchedule};
use crate::domain::record::{SignalRecord, SignalRun, Skip};
use crate::domain::sample::{PriceSample, sort_samples};
use crate::domain::session::{MinuteRange, Session};
use crate::domain::signal::{self, Signal, SignalPolicy};
use crate::ports::ephemeris_port::EphemerisPort;

/// What to do with a timestamp whose positions cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnavailablePolicy {
    /// Emit the record with `complete = false`.
    #[default]
    Flag,
    /// Leave the timestamp out of the output.
    Omit,
}

impl FromStr for UnavailablePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flag" => Ok(UnavailablePolicy::Flag),
            "omit" | "skip" => Ok(UnavailablePolicy::Omit),
            other => Err(format!("unknown unavailable policy '{}'", other)),
        }
    }
}

/// Where Gann offsets are measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GannAnchor {
    /// The session open on each timestamp's own date.
    #[default]
    SessionOpen,
    /// The first timestamp of the run.
    RangeStart,
}

impl FromStr for GannAnchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "session_open" | "session" => Ok(GannAnchor::SessionOpen),
            "range_start" | "first" => Ok(GannAnchor::RangeStart),
            other => Err(format!("unknown gann anchor '{}'", other)),
        }
    }
}

/// How a price sample is matched to the instant it is evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKey {
    /// The sample's own timestamp.
    #[default]
    Timestamp,
    /// The sample's clock time on the first sample's date.
    TimeOfDay,
}

impl FromStr for JoinKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "timestamp" | "datetime" => Ok(JoinKey::Timestamp),
            "time_of_day" | "time" => Ok(JoinKey::TimeOfDay),
            other => Err(format!("unknown join key '{}'", other)),
        }
    }
}

impl fmt::Display for JoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKey::Timestamp => f.write_str("timestamp"),
            JoinKey::TimeOfDay => f.write_str("time_of_day"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub bodies: Vec<Body>,
    pub aspects: AspectConfig,
    pub gann: GannSchedule,
    pub anchor: GannAnchor,
    pub session: Session,
    pub policy: SignalPolicy,
    pub on_unavailable: UnavailablePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let bodies = Body::CLASSICAL.to_vec();
        let pairs = BodyPair::all_of(&bodies);
        Self {
            bodies,
            aspects: AspectConfig::new(DEFAULT_ORB, pairs),
            gann: GannSchedule::default_offsets(),
            anchor: GannAnchor::default(),
            session: Session::default(),
            policy: SignalPolicy::default(),
            on_unavailable: UnavailablePolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.bodies.is_empty() {
            return Err(SignalError::config_invalid("astro", "bodies", "no bodies configured"));
        }
        if !(self.aspects.orb > 0.0 && self.aspects.orb.is_finite()) {
            return Err(SignalError::config_invalid("aspects", "orb", "orb must be positive"));
        }
        if let Some(pair) = self
            .aspects
            .pairs
            .iter()
            .find(|p| !self.bodies.contains(&p.a) || !self.bodies.contains(&p.b))
        {
            return Err(SignalError::config_invalid(
                "aspects",
                "pairs",
                format!("pair {} uses a body not listed in bodies", pair),
            ));
        }
        if self.policy == SignalPolicy::MoonSign && !self.bodies.contains(&Body::Moon) {
            return Err(SignalError::config_invalid(
                "signals",
                "policy",
                "moon_sign policy needs the Moon in bodies",
            ));
        }
        Ok(())
    }
}

/// One timestamp queued for evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Timestamp reported on the record.
    pub timestamp: NaiveDateTime,
    /// Instant the pipeline is evaluated at.
    pub evaluate_at: NaiveDateTime,
    pub sample: Option<f64>,
    pub row: Option<usize>,
}

impl Observation {
    pub fn at(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            evaluate_at: timestamp,
            sample: None,
            row: None,
        }
    }
}

/// Observations for a backtest, sorted ascending and joined by `key`.
pub fn backtest_observations(
    mut samples: Vec<PriceSample>,
    key: JoinKey,
) -> Result<Vec<Observation>, SignalError> {
    if samples.is_empty() {
        return Err(SignalError::invalid_input("samples", "no price rows to backtest"));
    }
    sort_samples(&mut samples);
    let reference: NaiveDate = samples[0].timestamp.date();
    Ok(samples
        .into_iter()
        .map(|s| Observation {
            timestamp: s.timestamp,
            evaluate_at: match key {
                JoinKey::Timestamp => s.timestamp,
                JoinKey::TimeOfDay => reference.and_time(s.timestamp.time()),
            },
            sample: Some(s.value),
            row: Some(s.row),
        })
        .collect())
}

enum Outcome {
    Complete(SignalRecord),
    Incomplete(SignalRecord, Skip),
    Omitted(Skip),
}

pub struct Driver<'a, E: EphemerisPort + ?Sized> {
    ephemeris: &'a E,
    config: &'a EngineConfig,
}

impl<'a, E: EphemerisPort + ?Sized> Driver<'a, E> {
    pub fn new(ephemeris: &'a E, config: &'a EngineConfig) -> Result<Self, SignalError> {
        config.validate()?;
        Ok(Self { ephemeris, config })
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    /// Every session minute of `date`.
    pub fn forecast_date(&self, date: NaiveDate) -> SignalStream<'_, 'a, E, MinuteObservations> {
        self.forecast(self.config.session.minutes_on(date))
    }

    /// Every minute from `start` to `end` inclusive.
    pub fn forecast_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<SignalStream<'_, 'a, E, MinuteObservations>, SignalError> {
        Ok(self.forecast(MinuteRange::new(start, end)?))
    }

    /// Every minute of an already-validated range.
    pub fn forecast(&self, range: MinuteRange) -> SignalStream<'_, 'a, E, MinuteObservations> {
        debug!(start = %range.start(), end = %range.end(), minutes = range.len(), "forecast range");
        let range_start = range.start();
        SignalStream::new(self, range.map(Observation::at as fn(NaiveDateTime) -> Observation), range_start)
    }

    /// Evaluate a price series, carrying each sample value through.
    pub fn backtest(
        &self,
        samples: Vec<PriceSample>,
        key: JoinKey,
    ) -> Result<SignalStream<'_, 'a, E, std::vec::IntoIter<Observation>>, SignalError> {
        let observations = backtest_observations(samples, key)?;
        debug!(rows = observations.len(), join = %key, "backtest series");
        let range_start = observations[0].evaluate_at;
        Ok(SignalStream::new(self, observations.into_iter(), range_start))
    }

    /// Gann membership of `ts`, using `range_start` for the range-start anchor.
    pub fn is_gann_checkpoint(&self, ts: NaiveDateTime, range_start: NaiveDateTime) -> bool {
        let start = match self.config.anchor {
            GannAnchor::SessionOpen => self.config.session.open_on(ts.date()),
            GannAnchor::RangeStart => range_start,
        };
        gann::is_checkpoint(ts, &gann::checkpoints(start, &self.config.gann))
    }

    fn synthesize(&self, positions: &[BodyPosition], aspects: &[aspect::AspectMatch], gann: bool) -> Signal {
        match self.config.policy {
            SignalPolicy::Aspects => signal::synthesize(aspects, gann),
            SignalPolicy::MoonSign => signal::synthesize_moon_sign(
                longitude_of(positions, Body::Moon).map(ZodiacSign::from_longitude),
                gann,
            ),
        }
    }

    fn evaluate(&self, obs: &Observation, range_start: NaiveDateTime) -> Outcome {
        let at = obs.evaluate_at;
        let is_gann = self.is_gann_checkpoint(at, range_start);

        match self.ephemeris.positions(at, &self.config.bodies) {
            Ok(positions) => {
                let aspects = aspect::detect(&positions, &self.config.aspects);
                let signal = self.synthesize(&positions, &aspects, is_gann);
                Outcome::Complete(SignalRecord {
                    timestamp: obs.timestamp,
                    positions,
                    aspects,
                    is_gann_checkpoint: is_gann,
                    signal,
                    sample: obs.sample,
                    complete: true,
                })
            }
            Err(err) => {
                let body = match &err {
                    SignalError::PositionUnavailable { body, .. } => Some(*body),
                    _ => None,
                };
                warn!(timestamp = %obs.timestamp, row = ?obs.row, error = %err, "position unavailable, skipping");
                let skip = Skip {
                    timestamp: obs.timestamp,
                    body,
                    row: obs.row,
                    reason: err.to_string(),
                };
                match self.config.on_unavailable {
                    UnavailablePolicy::Omit => Outcome::Omitted(skip),
                    UnavailablePolicy::Flag => {
                        let signal = self.synthesize(&[], &[], is_gann);
                        Outcome::Incomplete(
                            SignalRecord {
                                timestamp: obs.timestamp,
                                positions: Vec::new(),
                                aspects: Vec::new(),
                                is_gann_checkpoint: is_gann,
                                signal,
                                sample: obs.sample,
                                complete: false,
                            },
                            skip,
                        )
                    }
                }
            }
        }
    }
}

impl<'a, E: EphemerisPort + Sync + ?Sized> Driver<'a, E> {
    /// Evaluate on the rayon pool; output order matches input order.
    pub fn run_parallel(&self, observations: Vec<Observation>) -> SignalRun {
        let Some(range_start) = observations.first().map(|o| o.evaluate_at) else {
            return SignalRun::default();
        };
        let outcomes: Vec<Outcome> = observations
            .par_iter()
            .map(|obs| self.evaluate(obs, range_start))
            .collect();

        let mut run = SignalRun::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Complete(record) => run.records.push(record),
                Outcome::Incomplete(record, skip) => {
                    run.records.push(record);
                    run.skips.push(skip);
                }
                Outcome::Omitted(skip) => run.skips.push(skip),
            }
        }
        info!(records = run.records.len(), skipped = run.skipped(), "parallel run finished");
        run
    }
}

pub type MinuteObservations = std::iter::Map<MinuteRange, fn(NaiveDateTime) -> Observation>;

/// Lazy sequence of records. Skipped timestamps are tallied as the stream is
/// consumed; dropping the stream early stops evaluation.
pub struct SignalStream<'d, 'a, E: EphemerisPort + ?Sized, I> {
    driver: &'d Driver<'a, E>,
    observations: I,
    range_start: NaiveDateTime,
    skips: Vec<Skip>,
}

impl<'d, 'a, E, I> SignalStream<'d, 'a, E, I>
where
    E: EphemerisPort + ?Sized,
    I: Iterator<Item = Observation>,
{
    fn new(driver: &'d Driver<'a, E>, observations: I, range_start: NaiveDateTime) -> Self {
        Self {
            driver,
            observations,
            range_start,
            skips: Vec::new(),
        }
    }

    /// Timestamps skipped so far.
    pub fn skips(&self) -> &[Skip] {
        &self.skips
    }

    /// Drain the remaining records into a run.
    pub fn finish(mut self) -> SignalRun {
        let records: Vec<SignalRecord> = self.by_ref().collect();
        let run = SignalRun {
            records,
            skips: self.skips,
        };
        info!(records = run.records.len(), skipped = run.skipped(), "run finished");
        run
    }
}

impl<E, I> Iterator for SignalStream<'_, '_, E, I>
where
    E: EphemerisPort + ?Sized,
    I: Iterator<Item = Observation>,
{
    type Item = SignalRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let obs = self.observations.next()?;
            match self.driver.evaluate(&obs, self.range_start) {
                Outcome::Complete(record) => return Some(record),
                Outcome::Incomplete(record, skip) => {
                    self.skips.push(skip);
                    return Some(record);
                }
                Outcome::Omitted(skip) => self.skips.push(skip),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aspect::AspectKind;
    use std::collections::HashMap;

    /// Longitudes fixed per body, optionally failing at given minutes.
    struct StubEphemeris {
        longitudes: HashMap<Body, f64>,
        fail_at: Vec<NaiveDateTime>,
    }

    impl StubEphemeris {
        fn new(longitudes: &[(Body, f64)]) -> Self {
            Self {
                longitudes: longitudes.iter().copied().collect(),
                fail_at: Vec::new(),
            }
        }
    }

    impl EphemerisPort for StubEphemeris {
        fn longitude(&self, at: NaiveDateTime, body: Body) -> Result<f64, SignalError> {
            if self.fail_at.contains(&at) {
                return Err(SignalError::PositionUnavailable {
                    timestamp: at,
                    body,
                    reason: "stub failure".into(),
                });
            }
            Ok(self.longitudes.get(&body).copied().unwrap_or(0.0))
        }
    }

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn sun_moon_config() -> EngineConfig {
        EngineConfig {
            bodies: vec![Body::Sun, Body::Moon],
            aspects: AspectConfig::new(1.5, vec![BodyPair::new(Body::Sun, Body::Moon)]),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn forecast_flags_default_checkpoints() {
        let eph = StubEphemeris::new(&[(Body::Sun, 0.0), (Body::Moon, 45.0)]);
        let config = sun_moon_config();
        let driver = Driver::new(&eph, &config).unwrap();
        let run = driver.forecast_date(ts(0, 0).date()).finish();

        assert_eq!(run.records.len(), 376);
        let flagged: Vec<_> = run
            .records
            .iter()
            .filter(|r| r.is_gann_checkpoint)
            .map(|r| r.timestamp)
            .collect();
        assert_eq!(flagged.len(), 7);
        assert_eq!(flagged[0], ts(9, 45));
        assert_eq!(flagged[6], ts(12, 45));
        assert_eq!(run.count(Signal::Reversal), 7);
        assert_eq!(run.count(Signal::Hold), 369);
    }

    #[test]
    fn aspect_drives_signal_at_every_minute() {
        let eph = StubEphemeris::new(&[(Body::Sun, 10.0), (Body::Moon, 130.5)]);
        let config = sun_moon_config();
        let driver = Driver::new(&eph, &config).unwrap();
        let run = driver.forecast_range(ts(9, 15), ts(9, 20)).unwrap().finish();
        assert_eq!(run.records.len(), 6);
        assert!(run.records.iter().all(|r| r.signal == Signal::Buy));
        assert_eq!(run.records[0].aspects[0].kind, AspectKind::Trine);
    }

    #[test]
    fn range_start_anchor_uses_first_timestamp() {
        let eph = StubEphemeris::new(&[(Body::Sun, 0.0), (Body::Moon, 45.0)]);
        let config = EngineConfig {
            anchor: GannAnchor::RangeStart,
            gann: GannSchedule::Offsets(vec![30]),
            ..sun_moon_config()
        };
        let driver = Driver::new(&eph, &config).unwrap();
        let run = driver.forecast_range(ts(10, 0), ts(11, 0)).unwrap().finish();
        let flagged: Vec<_> = run.actionable().map(|r| r.timestamp).collect();
        assert_eq!(flagged, vec![ts(10, 30)]);
    }

    #[test]
    fn unavailable_positions_are_flagged() {
        let mut eph = StubEphemeris::new(&[(Body::Sun, 0.0), (Body::Moon, 45.0)]);
        eph.fail_at = vec![ts(9, 16)];
        let config = sun_moon_config();
        let driver = Driver::new(&eph, &config).unwrap();
        let run = driver.forecast_range(ts(9, 15), ts(9, 17)).unwrap().finish();

        assert_eq!(run.records.len(), 3);
        assert_eq!(run.skipped(), 1);
        assert!(!run.records[1].complete);
        assert!(run.records[1].positions.is_empty());
        assert_eq!(run.records[1].signal, Signal::Hold);
        assert_eq!(run.skips[0].body, Some(Body::Sun));
    }

    #[test]
    fn unavailable_positions_can_be_omitted() {
        let mut eph = StubEphemeris::new(&[(Body::Sun, 0.0), (Body::Moon, 45.0)]);
        eph.fail_at = vec![ts(9, 16)];
        let config = EngineConfig {
            on_unavailable: UnavailablePolicy::Omit,
            ..sun_moon_config()
        };
        let driver = Driver::new(&eph, &config).unwrap();
        let run = driver.forecast_range(ts(9, 15), ts(9, 17)).unwrap().finish();

        assert_eq!(run.records.len(), 2);
        assert_eq!(run.skipped(), 1);
        assert_eq!(run.skips[0].timestamp, ts(9, 16));
    }

    #[test]
    fn stream_can_stop_early() {
        let eph = StubEphemeris::new(&[(Body::Sun, 0.0), (Body::Moon, 45.0)]);
        let config = sun_moon_config();
        let driver = Driver::new(&eph, &config).unwrap();
        let first: Vec<_> = driver.forecast_date(ts(0, 0).date()).take(2).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].timestamp, ts(9, 16));
    }

    #[test]
    fn backtest_carries_samples_in_sorted_order() {
        let eph = StubEphemeris::new(&[(Body::Sun, 0.0), (Body::Moon, 45.0)]);
        let config = sun_moon_config();
        let driver = Driver::new(&eph, &config).unwrap();
        let samples = vec![
            PriceSample { timestamp: ts(9, 16), value: 101.5, row: 1 },
            PriceSample { timestamp: ts(9, 15), value: 100.0, row: 2 },
        ];
        let run = driver.backtest(samples, JoinKey::Timestamp).unwrap().finish();
        assert_eq!(run.records.len(), 2);
        assert_eq!(run.records[0].timestamp, ts(9, 15));
        assert_eq!(run.records[0].sample, Some(100.0));
        assert_eq!(run.records[1].sample, Some(101.5));
    }

    #[test]
    fn time_of_day_join_evaluates_on_first_date() {
        let next_day = NaiveDate::from_ymd_opt(2024, 1, 3)
            .unwrap()
            .and_hms_opt(9, 45, 0)
            .unwrap();
        let samples = vec![
            PriceSample { timestamp: ts(9, 15), value: 1.0, row: 1 },
            PriceSample { timestamp: next_day, value: 2.0, row: 2 },
        ];
        let obs = backtest_observations(samples, JoinKey::TimeOfDay).unwrap();
        assert_eq!(obs[1].timestamp, next_day);
        assert_eq!(obs[1].evaluate_at, ts(9, 45));
    }

    #[test]
    fn empty_backtest_is_invalid_input() {
        let eph = StubEphemeris::new(&[]);
        let config = sun_moon_config();
        let driver = Driver::new(&eph, &config).unwrap();
        assert!(matches!(
            driver.backtest(vec![], JoinKey::Timestamp),
            Err(SignalError::InvalidInput { .. })
        ));
    }

    #[test]
    fn parallel_matches_sequential() {
        let mut eph = StubEphemeris::new(&[(Body::Sun, 0.0), (Body::Moon, 89.0)]);
        eph.fail_at = vec![ts(10, 0)];
        let config = sun_moon_config();
        let driver = Driver::new(&eph, &config).unwrap();
        let sequential = driver.forecast_date(ts(0, 0).date()).finish();
        let observations: Vec<_> = Session::default()
            .minutes_on(ts(0, 0).date())
            .map(Observation::at)
            .collect();
        let parallel = driver.run_parallel(observations);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn moon_sign_policy() {
        // Moon at 215 degrees is in Scorpio, so every checkpoint buys
        let eph = StubEphemeris::new(&[(Body::Sun, 0.0), (Body::Moon, 215.0)]);
        let config = EngineConfig {
            policy: SignalPolicy::MoonSign,
            ..sun_moon_config()
        };
        let driver = Driver::new(&eph, &config).unwrap();
        let run = driver.forecast_date(ts(0, 0).date()).finish();
        assert_eq!(run.count(Signal::Buy), 7);
        assert_eq!(run.count(Signal::Hold), 369);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let eph = StubEphemeris::new(&[]);
        let bad_orb = EngineConfig {
            aspects: AspectConfig::new(0.0, vec![]),
            ..EngineConfig::default()
        };
        assert!(Driver::new(&eph, &bad_orb).is_err());

        let stray_pair = EngineConfig {
            bodies: vec![Body::Sun],
            aspects: AspectConfig::new(1.0, vec![BodyPair::new(Body::Sun, Body::Mars)]),
            ..EngineConfig::default()
        };
        assert!(Driver::new(&eph, &stray_pair).is_err());

        let moonless = EngineConfig {
            bodies: vec![Body::Sun],
            aspects: AspectConfig::new(1.0, vec![]),
            policy: SignalPolicy::MoonSign,
            ..EngineConfig::default()
        };
        assert!(Driver::new(&eph, &moonless).is_err());
    }

    #[test]
    fn parse_options() {
        assert_eq!("omit".parse::<UnavailablePolicy>().unwrap(), UnavailablePolicy::Omit);
        assert_eq!("range_start".parse::<GannAnchor>().unwrap(), GannAnchor::RangeStart);
        assert_eq!("time_of_day".parse::<JoinKey>().unwrap(), JoinKey::TimeOfDay);
        assert!("fuzzy".parse::<JoinKey>().is_err());
    }
}
