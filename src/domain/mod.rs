//! Core domain types and logic.

pub mod aspect;
pub mod astro_time;
pub mod body;
pub mod config_validation;
pub mod driver;
pub mod error;
pub mod gann;
pub mod observer;
pub mod record;
pub mod sample;
pub mod session;
pub mod signal;
