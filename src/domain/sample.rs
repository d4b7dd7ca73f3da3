//! Externally sourced price samples for backtest mode.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSample {
    pub timestamp: NaiveDateTime,
    pub value: f64,
    /// 1-based row in the source table counting the header, for error and skip
    /// reports.
    pub row: usize,
}

/// Sort ascending by timestamp. Stable, so equal timestamps keep input order.
pub fn sort_samples(samples: &mut [PriceSample]) {
    samples.sort_by_key(|s| s.timestamp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(h: u32, m: u32, value: f64, row: usize) -> PriceSample {
        PriceSample {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap(),
            value,
            row,
        }
    }

    #[test]
    fn sorts_unordered_rows() {
        let mut samples = vec![sample(9, 17, 3.0, 1), sample(9, 15, 1.0, 2), sample(9, 16, 2.0, 3)];
        sort_samples(&mut samples);
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(samples[0].row, 2);
    }
}
