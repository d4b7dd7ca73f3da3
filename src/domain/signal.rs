//! Folding aspect matches and Gann membership into one signal.

use crate::domain::aspect::{AspectKind, AspectMatch};
use crate::domain::body::ZodiacSign;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Buy,
    Sell,
    Reversal,
    Hold,
}

impl Signal {
    pub const ALL: [Signal; 4] = [Signal::Buy, Signal::Sell, Signal::Reversal, Signal::Hold];

    pub fn name(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Reversal => "REVERSAL",
            Signal::Hold => "HOLD",
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, Signal::Hold)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which rule set turns a record's inputs into a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalPolicy {
    /// Aspect precedence: trine/conjunction, then square/opposition, then
    /// checkpoint or sextile.
    #[default]
    Aspects,
    /// Moon-sign rule evaluated only at Gann checkpoints.
    MoonSign,
}

impl FromStr for SignalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aspects" | "aspect" => Ok(SignalPolicy::Aspects),
            "moon_sign" | "moon" => Ok(SignalPolicy::MoonSign),
            other => Err(format!("unknown signal policy '{}'", other)),
        }
    }
}

/// Precedence, highest first:
/// 1. no checkpoint and no aspects: HOLD
/// 2. any trine or conjunction: BUY
/// 3. any square or opposition: SELL
/// 4. checkpoint or any sextile: REVERSAL
/// 5. otherwise HOLD
///
/// BUY wins when one pair is trine and another square at the same instant.
pub fn synthesize(matches: &[AspectMatch], is_gann_checkpoint: bool) -> Signal {
    if !is_gann_checkpoint && matches.is_empty() {
        return Signal::Hold;
    }
    let any = |kinds: &[AspectKind]| matches.iter().any(|m| kinds.contains(&m.kind));

    if any(&[AspectKind::Trine, AspectKind::Conjunction]) {
        Signal::Buy
    } else if any(&[AspectKind::Square, AspectKind::Opposition]) {
        Signal::Sell
    } else if is_gann_checkpoint || any(&[AspectKind::Sextile]) {
        Signal::Reversal
    } else {
        Signal::Hold
    }
}

/// At a checkpoint: BUY with the Moon in Aries or Scorpio, SELL in Capricorn
/// or Virgo, otherwise REVERSAL. Away from checkpoints: HOLD.
pub fn synthesize_moon_sign(moon: Option<ZodiacSign>, is_gann_checkpoint: bool) -> Signal {
    if !is_gann_checkpoint {
        return Signal::Hold;
    }
    match moon {
        Some(ZodiacSign::Aries | ZodiacSign::Scorpio) => Signal::Buy,
        Some(ZodiacSign::Capricorn | ZodiacSign::Virgo) => Signal::Sell,
        _ => Signal::Reversal,
    }
}
