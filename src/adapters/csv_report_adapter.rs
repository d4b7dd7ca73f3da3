//! CSV signal table adapter implementing ReportPort.
//!
//! Layout: `datetime,time`, then `<body>_lon,<body>_sign` per configured body,
//! then `aspects,gann_checkpoint,signal`, an optional `sample` column for
//! backtests, and `complete`. Incomplete records leave the position
//! cells blank.

use std::io::Write;

use crate::domain::aspect;
use crate::domain::body::Body;
use crate::domain::error::SignalError;
use crate::domain::record::SignalRecord;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter {
    bodies: Vec<Body>,
    precision: usize,
    signals_only: bool,
    with_sample: bool,
}

impl CsvReportAdapter {
    pub fn new(bodies: &[Body], precision: usize, signals_only: bool) -> Self {
        Self {
            bodies: bodies.to_vec(),
            precision,
            signals_only,
            with_sample: false,
        }
    }

    /// Add the `sample` column carried by backtest records.
    pub fn with_sample_column(mut self, with_sample: bool) -> Self {
        self.with_sample = with_sample;
        self
    }

    fn header(&self) -> Vec<String> {
        let mut header = vec!["datetime".to_string(), "time".to_string()];
        for body in &self.bodies {
            header.push(format!("{}_lon", body.key()));
            header.push(format!("{}_sign", body.key()));
        }
        header.extend(["aspects", "gann_checkpoint", "signal"].map(String::from));
        if self.with_sample {
            header.push("sample".to_string());
        }
        header.push("complete".to_string());
        header
    }

    fn row(&self, record: &SignalRecord) -> Vec<String> {
        let mut row = vec![
            record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.timestamp.format("%H:%M").to_string(),
        ];
        for &body in &self.bodies {
            match record.longitude(body) {
                Some(lon) => {
                    row.push(format!("{:.*}", self.precision, lon));
                    row.push(record.sign(body).map(|s| s.name().to_string()).unwrap_or_default());
                }
                None => {
                    row.push(String::new());
                    row.push(String::new());
                }
            }
        }
        row.push(aspect::describe(&record.aspects));
        row.push(record.is_gann_checkpoint.to_string());
        row.push(record.signal.name().to_string());
        if self.with_sample {
            row.push(record.sample.map(|v| v.to_string()).unwrap_or_default());
        }
        row.push(record.complete.to_string());
        row
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        records: &mut dyn Iterator<Item = SignalRecord>,
        out: &mut dyn Write,
    ) -> Result<usize, SignalError> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(self.header())?;

        let mut rows = 0;
        for record in records {
            if self.signals_only && !record.signal.is_actionable() {
                continue;
            }
            writer.write_record(self.row(&record))?;
            rows += 1;
        }
        writer.flush()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aspect::{AspectKind, AspectMatch};
    use crate::domain::body::BodyPosition;
    use crate::domain::signal::Signal;
    use chrono::NaiveDate;

    fn record(minute: u32, signal: Signal, complete: bool) -> SignalRecord {
        let timestamp = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, minute, 0)
            .unwrap();
        let positions = if complete {
            vec![
                BodyPosition { body: Body::Sun, longitude: 281.234 },
                BodyPosition { body: Body::Moon, longitude: 169.6651 },
            ]
        } else {
            vec![]
        };
        let aspects = if signal == Signal::Buy {
            vec![AspectMatch {
                a: Body::Sun,
                b: Body::Moon,
                kind: AspectKind::Trine,
                separation: 119.0,
            }]
        } else {
            vec![]
        };
        SignalRecord {
            timestamp,
            positions,
            aspects,
            is_gann_checkpoint: minute == 45,
            signal,
            sample: None,
            complete,
        }
    }

    fn render(adapter: &CsvReportAdapter, records: Vec<SignalRecord>) -> (usize, String) {
        let mut buf = Vec::new();
        let rows = adapter.write(&mut records.into_iter(), &mut buf).unwrap();
        (rows, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn writes_header_and_rows() {
        let adapter = CsvReportAdapter::new(&[Body::Sun, Body::Moon], 2, false);
        let records = vec![record(15, Signal::Buy, true), record(16, Signal::Hold, true)];
        let (rows, text) = render(&adapter, records);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(rows, 2);
        assert_eq!(
            lines[0],
            "datetime,time,sun_lon,sun_sign,moon_lon,moon_sign,aspects,gann_checkpoint,signal,complete"
        );
        assert_eq!(
            lines[1],
            "2024-01-02 09:15:00,09:15,281.23,CAPRICORN,169.67,VIRGO,Sun trine Moon (1.00),false,BUY,true"
        );
        assert!(lines[2].ends_with(",,false,HOLD,true"));
    }

    #[test]
    fn precision_is_applied() {
        let adapter = CsvReportAdapter::new(&[Body::Moon], 4, false);
        let records = vec![record(15, Signal::Hold, true)];
        let (_, text) = render(&adapter, records);
        assert!(text.contains(",169.6651,VIRGO,"));
    }

    #[test]
    fn signals_only_drops_hold() {
        let adapter = CsvReportAdapter::new(&[Body::Sun, Body::Moon], 2, true);
        let records = vec![
            record(15, Signal::Buy, true),
            record(16, Signal::Hold, true),
            record(45, Signal::Reversal, true),
        ];
        let (rows, text) = render(&adapter, records);
        assert_eq!(rows, 2);
        assert_eq!(text.lines().count(), 3);
        assert!(!text.contains("HOLD"));
    }

    #[test]
    fn incomplete_records_have_blank_positions() {
        let adapter = CsvReportAdapter::new(&[Body::Sun], 2, false);
        let records = vec![record(45, Signal::Reversal, false)];
        let (_, text) = render(&adapter, records);
        assert_eq!(
            text.lines().nth(1).unwrap(),
            "2024-01-02 09:45:00,09:45,,,,true,REVERSAL,false"
        );
    }

    #[test]
    fn sample_column_appears_for_backtests() {
        let adapter = CsvReportAdapter::new(&[Body::Sun], 2, false).with_sample_column(true);
        let mut rec = record(15, Signal::Hold, true);
        rec.sample = Some(21700.5);
        let records = vec![rec];
        let (_, text) = render(&adapter, records);
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].ends_with(",signal,sample,complete"));
        assert!(lines[1].ends_with(",HOLD,21700.5,true"));
    }

    #[test]
    fn rows_are_written_as_records_arrive() {
        let adapter = CsvReportAdapter::new(&[Body::Sun], 2, false);
        let mut pulled = 0;
        let mut records = (15..20)
            .map(|m| record(m, Signal::Hold, true))
            .inspect(|_| pulled += 1);
        let mut buf = Vec::new();
        let rows = adapter.write(&mut records, &mut buf).unwrap();
        drop(records);
        assert_eq!(rows, 5);
        assert_eq!(pulled, 5);
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.lines().next().unwrap().contains("sample"));
        assert_eq!(text.lines().count(), 6);
    }

    #[test]
    fn write_file_creates_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("signals.csv");
        let adapter = CsvReportAdapter::new(&[Body::Sun], 2, false);
        let records = vec![record(15, Signal::Hold, true)];
        assert_eq!(adapter.write_file(&mut records.into_iter(), &path).unwrap(), 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("datetime,time,sun_lon,sun_sign"));
    }
}
