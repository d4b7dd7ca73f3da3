//! Configuration reading and validation.
//!
//! Every recognized key is parsed up-front so a run aborts with a
//! configuration error before any record is produced. The `read_*` functions
//! return typed settings; `validate_signal_config` runs all of them.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::aspect::{AspectConfig, BodyPair, DEFAULT_ORB};
use crate::domain::astro_time::parse_utc_offset;
use crate::domain::body::Body;
use crate::domain::driver::{EngineConfig, GannAnchor, JoinKey, UnavailablePolicy};
use crate::domain::error::SignalError;
use crate::domain::gann::GannSchedule;
use crate::domain::observer::{
    DEFAULT_LATITUDE, DEFAULT_LONGITUDE, DEFAULT_TIMEZONE, Frame, Location, Observer, Zodiac,
};
use crate::domain::session::{self, DEFAULT_CLOSE, DEFAULT_OPEN, Session};
use crate::domain::signal::SignalPolicy;
use crate::ports::config_port::ConfigPort;

pub const MAX_ORB: f64 = 30.0;
pub const DEFAULT_SAMPLE_COLUMN: &str = "close";
pub const DEFAULT_PRECISION: usize = 2;

/// Which timestamps a forecast covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastWindow {
    /// Session open to close on one date.
    Session(NaiveDate),
    /// Explicit inclusive range.
    Range(NaiveDateTime, NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktestOptions {
    pub input: Option<PathBuf>,
    pub sample_column: String,
    pub join: JoinKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOptions {
    pub path: Option<PathBuf>,
    pub precision: usize,
    pub signals_only: bool,
}

pub fn validate_signal_config(config: &dyn ConfigPort) -> Result<(), SignalError> {
    read_engine_config(config)?;
    read_observer(config)?;
    read_window(config)?;
    read_backtest_options(config)?;
    read_output_options(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> SignalError {
    SignalError::config_invalid(section, key, reason)
}

/// Parse a present key with `FromStr`, mapping the error into `ConfigInvalid`.
fn parse_key<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<T>, SignalError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(section, key, format!("'{}': {}", raw.trim(), e))),
    }
}

fn read_number(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, SignalError> {
    let value = parse_key::<f64>(config, section, key)?.unwrap_or(default);
    if !value.is_finite() {
        return Err(invalid(section, key, "must be a finite number"));
    }
    Ok(value)
}

pub fn read_bodies(config: &dyn ConfigPort) -> Result<Vec<Body>, SignalError> {
    let Some(names) = config.get_list("astro", "bodies") else {
        return Ok(Body::CLASSICAL.to_vec());
    };
    let mut bodies = Vec::with_capacity(names.len());
    for name in names {
        let body: Body = name.parse().map_err(|e: String| invalid("astro", "bodies", e))?;
        if bodies.contains(&body) {
            return Err(invalid("astro", "bodies", format!("{} listed twice", body)));
        }
        bodies.push(body);
    }
    if bodies.is_empty() {
        return Err(invalid("astro", "bodies", "at least one body is required"));
    }
    Ok(bodies)
}

pub fn read_aspect_config(config: &dyn ConfigPort, bodies: &[Body]) -> Result<AspectConfig, SignalError> {
    let orb = read_number(config, "aspects", "orb", DEFAULT_ORB)?;
    if orb <= 0.0 {
        return Err(invalid("aspects", "orb", "orb must be positive"));
    }
    if orb >= MAX_ORB {
        return Err(invalid("aspects", "orb", format!("orb must be below {}", MAX_ORB)));
    }

    let pairs = match config.get_list("aspects", "pairs") {
        None => BodyPair::all_of(bodies),
        Some(items) => {
            let mut pairs = Vec::with_capacity(items.len());
            for item in items {
                let pair: BodyPair = item.parse().map_err(|e: String| invalid("aspects", "pairs", e))?;
                if pair.a == pair.b {
                    return Err(invalid("aspects", "pairs", format!("{} pairs a body with itself", pair)));
                }
                if !bodies.contains(&pair.a) || !bodies.contains(&pair.b) {
                    return Err(invalid(
                        "aspects",
                        "pairs",
                        format!("{} uses a body missing from [astro] bodies", pair),
                    ));
                }
                pairs.push(pair);
            }
            pairs
        }
    };
    Ok(AspectConfig::new(orb, pairs))
}

pub fn read_gann_schedule(config: &dyn ConfigPort) -> Result<GannSchedule, SignalError> {
    let offsets = config.get_string("gann", "offsets");
    let times = config.get_string("gann", "times");
    match (offsets, times) {
        (Some(_), Some(_)) => Err(invalid("gann", "times", "set either offsets or times, not both")),
        (Some(list), None) => GannSchedule::parse_offsets(&list).map_err(|e| invalid("gann", "offsets", e)),
        (None, Some(list)) => GannSchedule::parse_times(&list).map_err(|e| invalid("gann", "times", e)),
        (None, None) => Ok(GannSchedule::default_offsets()),
    }
}

pub fn read_session(config: &dyn ConfigPort) -> Result<Session, SignalError> {
    let open_raw = config.get_string("session", "open").unwrap_or_else(|| DEFAULT_OPEN.into());
    let close_raw = config.get_string("session", "close").unwrap_or_else(|| DEFAULT_CLOSE.into());
    let open = session::parse_clock(&open_raw).map_err(|_| invalid("session", "open", "expected HH:MM"))?;
    let close = session::parse_clock(&close_raw).map_err(|_| invalid("session", "close", "expected HH:MM"))?;
    Session::new(open, close).map_err(|_| invalid("session", "close", "close must be after open"))
}

pub fn read_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, SignalError> {
    let bodies = read_bodies(config)?;
    let aspects = read_aspect_config(config, &bodies)?;
    let engine = EngineConfig {
        aspects,
        gann: read_gann_schedule(config)?,
        anchor: parse_key::<GannAnchor>(config, "gann", "anchor")?.unwrap_or_default(),
        session: read_session(config)?,
        policy: parse_key::<SignalPolicy>(config, "signals", "policy")?.unwrap_or_default(),
        on_unavailable: parse_key::<UnavailablePolicy>(config, "signals", "on_unavailable")?
            .unwrap_or_default(),
        bodies,
    };
    engine.validate()?;
    Ok(engine)
}

pub fn read_observer(config: &dyn ConfigPort) -> Result<Observer, SignalError> {
    let tz = config
        .get_string("location", "timezone")
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    let offset = parse_utc_offset(&tz).map_err(|e| invalid("location", "timezone", e))?;
    let latitude = read_number(config, "location", "latitude", DEFAULT_LATITUDE)?;
    let longitude = read_number(config, "location", "longitude", DEFAULT_LONGITUDE)?;
    let location = Location::new(latitude, longitude).map_err(|e| {
        let key = if e.starts_with("latitude") { "latitude" } else { "longitude" };
        invalid("location", key, e)
    })?;
    Ok(Observer {
        offset,
        location,
        zodiac: parse_key::<Zodiac>(config, "astro", "zodiac")?.unwrap_or_default(),
        frame: parse_key::<Frame>(config, "astro", "frame")?.unwrap_or_default(),
    })
}

/// `[session] start`/`end` win over `[session] date`. None when neither is set.
pub fn read_window(config: &dyn ConfigPort) -> Result<Option<ForecastWindow>, SignalError> {
    let start = config.get_string("session", "start");
    let end = config.get_string("session", "end");
    match (start, end) {
        (Some(s), Some(e)) => {
            let start = session::parse_timestamp(&s)
                .map_err(|_| invalid("session", "start", "expected YYYY-MM-DD HH:MM"))?;
            let end = session::parse_timestamp(&e)
                .map_err(|_| invalid("session", "end", "expected YYYY-MM-DD HH:MM"))?;
            if start > end {
                return Err(invalid("session", "start", "start must not be after end"));
            }
            Ok(Some(ForecastWindow::Range(start, end)))
        }
        (Some(_), None) => Err(SignalError::ConfigMissing {
            section: "session".into(),
            key: "end".into(),
        }),
        (None, Some(_)) => Err(SignalError::ConfigMissing {
            section: "session".into(),
            key: "start".into(),
        }),
        (None, None) => match config.get_string("session", "date") {
            Some(d) => session::parse_date(&d)
                .map(|date| Some(ForecastWindow::Session(date)))
                .map_err(|_| invalid("session", "date", "expected YYYY-MM-DD")),
            None => Ok(None),
        },
    }
}

pub fn read_backtest_options(config: &dyn ConfigPort) -> Result<BacktestOptions, SignalError> {
    let sample_column = match config.get_string("backtest", "sample_column") {
        Some(c) if c.trim().is_empty() => {
            return Err(invalid("backtest", "sample_column", "must not be empty"));
        }
        Some(c) => c.trim().to_string(),
        None => DEFAULT_SAMPLE_COLUMN.to_string(),
    };
    Ok(BacktestOptions {
        input: config
            .get_string("backtest", "input")
            .filter(|s| !s.trim().is_empty())
            .map(|s| PathBuf::from(s.trim())),
        sample_column,
        join: parse_key::<JoinKey>(config, "backtest", "join")?.unwrap_or_default(),
    })
}

pub fn read_output_options(config: &dyn ConfigPort) -> Result<OutputOptions, SignalError> {
    let precision = parse_key::<i64>(config, "output", "precision")?.unwrap_or(DEFAULT_PRECISION as i64);
    if !(0..=10).contains(&precision) {
        return Err(invalid("output", "precision", "precision must be between 0 and 10"));
    }
    Ok(OutputOptions {
        path: config
            .get_string("output", "path")
            .filter(|s| !s.trim().is_empty())
            .map(|s| PathBuf::from(s.trim())),
        precision: precision as usize,
        signals_only: config.get_bool("signals", "signals_only", false),
    })
}
