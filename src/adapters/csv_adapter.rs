//! CSV price series adapter.
//!
//! The timestamp column is the first header containing `time` or `date`
//! (case-insensitive). The sample column is matched by name, also
//! case-insensitively.

use crate::domain::error::SignalError;
use crate::domain::sample::{PriceSample, sort_samples};
use crate::domain::session::parse_timestamp;
use crate::ports::data_port::DataPort;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    path: PathBuf,
    sample_column: String,
}

impl CsvAdapter {
    pub fn new(path: impl Into<PathBuf>, sample_column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sample_column: sample_column.into(),
        }
    }

    /// Parse samples from CSV text. Row numbers count the header as row 1.
    pub fn parse(content: &str, sample_column: &str) -> Result<Vec<PriceSample>, SignalError> {
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers()?.clone();

        let time_idx = headers
            .iter()
            .position(|h| {
                let h = h.trim().to_lowercase();
                h.contains("time") || h.contains("date")
            })
            .ok_or_else(|| SignalError::invalid_input("header", "no timestamp column (time/date)"))?;
        let sample_idx = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(sample_column.trim()))
            .ok_or_else(|| {
                SignalError::invalid_input("header", format!("no '{}' column", sample_column))
            })?;

        let mut samples = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let record = result?;
            let row = i + 2;
            let context = format!("row {}", row);

            let ts_str = record
                .get(time_idx)
                .ok_or_else(|| SignalError::invalid_input(&context, "missing timestamp"))?;
            let timestamp = parse_timestamp(ts_str).map_err(|_| {
                SignalError::invalid_input(&context, format!("unparsable timestamp '{}'", ts_str.trim()))
            })?;

            let value_str = record
                .get(sample_idx)
                .ok_or_else(|| SignalError::invalid_input(&context, format!("missing {}", sample_column)))?;
            let value: f64 = value_str.trim().parse().map_err(|_| {
                SignalError::invalid_input(
                    &context,
                    format!("invalid {} value '{}'", sample_column, value_str.trim()),
                )
            })?;

            samples.push(PriceSample {
                timestamp,
                value,
                row,
            });
        }

        sort_samples(&mut samples);
        Ok(samples)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_samples(&self) -> Result<Vec<PriceSample>, SignalError> {
        let content = fs::read_to_string(&self.path)?;
        Self::parse(&content, &self.sample_column)
    }
}
