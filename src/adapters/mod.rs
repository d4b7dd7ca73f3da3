//! Concrete adapter implementations for ports.

pub mod analytical_ephemeris;
pub mod csv_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
