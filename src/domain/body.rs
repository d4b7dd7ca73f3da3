//! Celestial bodies, ecliptic longitudes and zodiac signs.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Body {
    Sun,
    Moon,
    Mercury,
    Venus,
    Mars,
    Jupiter,
    Saturn,
    /// Mean north lunar node.
    Rahu,
    /// Mean south lunar node, always opposite Rahu.
    Ketu,
}

impl Body {
    pub const CLASSICAL: [Body; 7] = [
        Body::Sun,
        Body::Moon,
        Body::Mercury,
        Body::Venus,
        Body::Mars,
        Body::Jupiter,
        Body::Saturn,
    ];

    pub const ALL: [Body; 9] = [
        Body::Sun,
        Body::Moon,
        Body::Mercury,
        Body::Venus,
        Body::Mars,
        Body::Jupiter,
        Body::Saturn,
        Body::Rahu,
        Body::Ketu,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Body::Sun => "Sun",
            Body::Moon => "Moon",
            Body::Mercury => "Mercury",
            Body::Venus => "Venus",
            Body::Mars => "Mars",
            Body::Jupiter => "Jupiter",
            Body::Saturn => "Saturn",
            Body::Rahu => "Rahu",
            Body::Ketu => "Ketu",
        }
    }

    /// Lowercase column prefix used in exported tables.
    pub fn key(&self) -> String {
        self.name().to_lowercase()
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Body {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sun" => Ok(Body::Sun),
            "moon" => Ok(Body::Moon),
            "mercury" => Ok(Body::Mercury),
            "venus" => Ok(Body::Venus),
            "mars" => Ok(Body::Mars),
            "jupiter" => Ok(Body::Jupiter),
            "saturn" => Ok(Body::Saturn),
            "rahu" | "north_node" => Ok(Body::Rahu),
            "ketu" | "south_node" => Ok(Body::Ketu),
            other => Err(format!("unknown body '{}'", other)),
        }
    }
}

/// Wrap any angle into [0, 360).
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZodiacSign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    const ORDER: [ZodiacSign; 12] = [
        ZodiacSign::Aries,
        ZodiacSign::Taurus,
        ZodiacSign::Gemini,
        ZodiacSign::Cancer,
        ZodiacSign::Leo,
        ZodiacSign::Virgo,
        ZodiacSign::Libra,
        ZodiacSign::Scorpio,
        ZodiacSign::Sagittarius,
        ZodiacSign::Capricorn,
        ZodiacSign::Aquarius,
        ZodiacSign::Pisces,
    ];

    /// floor(longitude / 30) over the normalized longitude.
    pub fn from_longitude(longitude: f64) -> Self {
        let index = (normalize_degrees(longitude) / 30.0).floor() as usize;
        Self::ORDER[index.min(11)]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ZodiacSign::Aries => "ARIES",
            ZodiacSign::Taurus => "TAURUS",
            ZodiacSign::Gemini => "GEMINI",
            ZodiacSign::Cancer => "CANCER",
            ZodiacSign::Leo => "LEO",
            ZodiacSign::Virgo => "VIRGO",
            ZodiacSign::Libra => "LIBRA",
            ZodiacSign::Scorpio => "SCORPIO",
            ZodiacSign::Sagittarius => "SAGITTARIUS",
            ZodiacSign::Capricorn => "CAPRICORN",
            ZodiacSign::Aquarius => "AQUARIUS",
            ZodiacSign::Pisces => "PISCES",
        }
    }
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A body's ecliptic longitude at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPosition {
    pub body: Body,
    pub longitude: f64,
}

impl BodyPosition {
    pub fn sign(&self) -> ZodiacSign {
        ZodiacSign::from_longitude(self.longitude)
    }
}

/// Longitude of `body` in a position table, if present.
pub fn longitude_of(positions: &[BodyPosition], body: Body) -> Option<f64> {
    positions
        .iter()
        .find(|p| p.body == body)
        .map(|p| p.longitude)
}
