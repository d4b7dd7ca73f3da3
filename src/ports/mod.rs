//! Port traits: the seams between the signal engine and the outside world.

pub mod config_port;
pub mod data_port;
pub mod ephemeris_port;
pub mod report_port;
