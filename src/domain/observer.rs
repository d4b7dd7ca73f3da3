//! Observer settings for the ephemeris: civil offset, site, zodiac and frame.

use chrono::{FixedOffset, Offset, Utc};
use std::fmt;
use std::str::FromStr;

use crate::domain::astro_time::parse_utc_offset;

/// Mumbai, the default trading site.
pub const DEFAULT_LATITUDE: f64 = 19.0760;
pub const DEFAULT_LONGITUDE: f64 = 72.8777;
pub const DEFAULT_TIMEZONE: &str = "+05:30";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Degrees north, [-90, 90].
    pub latitude: f64,
    /// Degrees east, [-180, 180].
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, String> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(format!("latitude {} outside [-90, 90]", latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(format!("longitude {} outside [-180, 180]", longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl Default for Location {
    fn default() -> Self {
        Self {
            latitude: DEFAULT_LATITUDE,
            longitude: DEFAULT_LONGITUDE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zodiac {
    #[default]
    Tropical,
    /// Tropical minus the Lahiri ayanamsa.
    Sidereal,
}

impl FromStr for Zodiac {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tropical" => Ok(Zodiac::Tropical),
            "sidereal" | "lahiri" => Ok(Zodiac::Sidereal),
            other => Err(format!("unknown zodiac '{}'", other)),
        }
    }
}

impl fmt::Display for Zodiac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zodiac::Tropical => f.write_str("tropical"),
            Zodiac::Sidereal => f.write_str("sidereal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Frame {
    #[default]
    Geocentric,
    /// Geocentric plus lunar parallax at the observer's site.
    Topocentric,
}

impl FromStr for Frame {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "geocentric" => Ok(Frame::Geocentric),
            "topocentric" => Ok(Frame::Topocentric),
            other => Err(format!("unknown frame '{}'", other)),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Geocentric => f.write_str("geocentric"),
            Frame::Topocentric => f.write_str("topocentric"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observer {
    pub offset: FixedOffset,
    pub location: Location,
    pub zodiac: Zodiac,
    pub frame: Frame,
}

impl Observer {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            location: Location::default(),
            zodiac: Zodiac::default(),
            frame: Frame::default(),
        }
    }

    /// UTC observer with default site, tropical and geocentric.
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }
}

impl Default for Observer {
    fn default() -> Self {
        Self::new(default_offset())
    }
}

fn default_offset() -> FixedOffset {
    parse_utc_offset(DEFAULT_TIMEZONE).unwrap_or_else(|_| Utc.fix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_bounds() {
        assert!(Location::new(19.07, 72.87).is_ok());
        assert!(Location::new(91.0, 0.0).is_err());
        assert!(Location::new(0.0, -181.0).is_err());
    }

    #[test]
    fn parse_zodiac_and_frame() {
        assert_eq!("Sidereal".parse::<Zodiac>().unwrap(), Zodiac::Sidereal);
        assert_eq!("tropical".parse::<Zodiac>().unwrap(), Zodiac::Tropical);
        assert!("draconic".parse::<Zodiac>().is_err());
        assert_eq!("topocentric".parse::<Frame>().unwrap(), Frame::Topocentric);
        assert!("heliocentric".parse::<Frame>().is_err());
    }

    #[test]
    fn default_observer_is_ist_mumbai() {
        let obs = Observer::default();
        assert_eq!(obs.offset.local_minus_utc(), 19_800);
        assert_eq!(obs.location, Location::default());
        assert_eq!(obs.zodiac, Zodiac::Tropical);
        assert_eq!(obs.frame, Frame::Geocentric);
        assert_eq!(Observer::utc().offset.local_minus_utc(), 0);
    }
}
