//! Ephemeris access port trait.

use crate::domain::body::{Body, BodyPosition};
use crate::domain::error::SignalError;
use chrono::NaiveDateTime;

/// Ecliptic longitude of a body at a civil timestamp.
///
/// Implementations are deterministic: the same (timestamp, body) always gives
/// the same longitude, in [0, 360). A position that cannot be resolved is
/// reported as `SignalError::PositionUnavailable`.
pub trait EphemerisPort {
    fn longitude(&self, at: NaiveDateTime, body: Body) -> Result<f64, SignalError>;

    /// Longitudes for every body, in the order given. Fails on the first body
    /// that cannot be resolved.
    fn positions(&self, at: NaiveDateTime, bodies: &[Body]) -> Result<Vec<BodyPosition>, SignalError> {
        bodies
            .iter()
            .map(|&body| {
                self.longitude(at, body)
                    .map(|longitude| BodyPosition { body, longitude })
            })
            .collect()
    }
}
