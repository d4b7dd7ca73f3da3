//! Aspect detection between pairs of body longitudes.
//!
//! Separation is the shorter arc between two longitudes, so it always lies in
//! [0, 180]. A pair matches an aspect kind when |separation - angle| <= orb.
//! Every kind within orb is reported; the detector never picks a single best
//! match.

use crate::domain::body::{Body, BodyPosition, longitude_of, normalize_degrees};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_ORB: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectKind {
    Conjunction,
    Sextile,
    Square,
    Trine,
    Opposition,
}

impl AspectKind {
    /// Canonical separation angle in degrees.
    pub fn angle(&self) -> f64 {
        match self {
            AspectKind::Conjunction => 0.0,
            AspectKind::Sextile => 60.0,
            AspectKind::Square => 90.0,
            AspectKind::Trine => 120.0,
            AspectKind::Opposition => 180.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AspectKind::Conjunction => "conjunction",
            AspectKind::Sextile => "sextile",
            AspectKind::Square => "square",
            AspectKind::Trine => "trine",
            AspectKind::Opposition => "opposition",
        }
    }
}

impl fmt::Display for AspectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered pair of bodies to test for aspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyPair {
    pub a: Body,
    pub b: Body,
}

impl BodyPair {
    pub fn new(a: Body, b: Body) -> Self {
        Self { a, b }
    }

    /// Every unordered pair of distinct bodies, in list order.
    pub fn all_of(bodies: &[Body]) -> Vec<BodyPair> {
        let mut pairs = Vec::new();
        for (i, &a) in bodies.iter().enumerate() {
            for &b in &bodies[i + 1..] {
                pairs.push(BodyPair::new(a, b));
            }
        }
        pairs
    }
}

impl FromStr for BodyPair {
    type Err = String;

    /// Parses `sun-moon` (also `sun/moon` or `sun:moon`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(['-', '/', ':']);
        let (Some(a), Some(b), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("expected 'body-body', got '{}'", s.trim()));
        };
        Ok(BodyPair::new(a.parse()?, b.parse()?))
    }
}

impl fmt::Display for BodyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.a, self.b)
    }
}

/// The aspect kinds a detector checks. Passed explicitly rather than read from
/// a process-wide table.
#[derive(Debug, Clone, PartialEq)]
pub struct AspectTable {
    pub kinds: Vec<AspectKind>,
}

impl AspectTable {
    pub fn standard() -> Self {
        Self {
            kinds: vec![
                AspectKind::Conjunction,
                AspectKind::Sextile,
                AspectKind::Square,
                AspectKind::Trine,
                AspectKind::Opposition,
            ],
        }
    }
}

impl Default for AspectTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AspectConfig {
    pub orb: f64,
    pub pairs: Vec<BodyPair>,
    pub table: AspectTable,
}

impl AspectConfig {
    pub fn new(orb: f64, pairs: Vec<BodyPair>) -> Self {
        Self {
            orb,
            pairs,
            table: AspectTable::standard(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectMatch {
    pub a: Body,
    pub b: Body,
    pub kind: AspectKind,
    /// Measured circular separation in degrees.
    pub separation: f64,
}

impl AspectMatch {
    /// Distance from the exact aspect angle.
    pub fn deviation(&self) -> f64 {
        (self.separation - self.kind.angle()).abs()
    }
}

impl fmt::Display for AspectMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({:.2})",
            self.a,
            self.kind,
            self.b,
            self.deviation()
        )
    }
}

/// Shorter-arc angular distance between two longitudes, in [0, 180].
pub fn separation(lon_a: f64, lon_b: f64) -> f64 {
    let diff = normalize_degrees((lon_a - lon_b).abs());
    diff.min(360.0 - diff)
}

/// Report every aspect within orb for each configured pair.
///
/// Pairs naming a body absent from `positions` are skipped.
pub fn detect(positions: &[BodyPosition], config: &AspectConfig) -> Vec<AspectMatch> {
    let mut matches = Vec::new();
    for pair in &config.pairs {
        let (Some(lon_a), Some(lon_b)) = (
            longitude_of(positions, pair.a),
            longitude_of(positions, pair.b),
        ) else {
            continue;
        };
        let sep = separation(lon_a, lon_b);
        for &kind in &config.table.kinds {
            if (sep - kind.angle()).abs() <= config.orb {
                matches.push(AspectMatch {
                    a: pair.a,
                    b: pair.b,
                    kind,
                    separation: sep,
                });
            }
        }
    }
    matches
}

/// Semicolon-joined human description of a match list.
pub fn describe(matches: &[AspectMatch]) -> String {
    matches
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
