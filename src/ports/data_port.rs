//! Price sample port trait.

use crate::domain::error::SignalError;
use crate::domain::sample::PriceSample;

pub trait DataPort {
    /// All samples in the source, sorted by timestamp.
    fn fetch_samples(&self) -> Result<Vec<PriceSample>, SignalError>;
}
