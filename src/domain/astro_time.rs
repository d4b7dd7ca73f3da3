//! Civil time to the continuous day count used by the orbital model.
//!
//! Timestamps are civil times in one fixed offset chosen by the caller. They
//! are truncated to the minute, shifted to UT, and expressed as days since
//! 2000 January 0.0 UT (1999-12-31 00:00 UT).

use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, Timelike, Utc};

use crate::domain::gann::truncate_to_minute;

const MAX_OFFSET_SECONDS: i32 = 14 * 3600;

/// Parse `+05:30`, `-0400`, `+05`, `Z` or `UTC`. Offsets beyond 14 hours are
/// rejected.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, String> {
    let s = value.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }
    let bytes = s.as_bytes();
    let hours_only = bytes.len() == 3 && bytes[1..].iter().all(u8::is_ascii_digit);
    let offset = if hours_only {
        format!("{}:00", s).parse::<FixedOffset>()
    } else {
        s.parse::<FixedOffset>()
    }
    .map_err(|_| format!("offset '{}' must look like +HH:MM", s))?;
    if offset.local_minus_utc().abs() > MAX_OFFSET_SECONDS {
        return Err(format!("offset '{}' out of range", s));
    }
    Ok(offset)
}

/// Civil time in `offset` to UT, minute resolution. None when the shifted
/// instant falls outside the representable calendar.
pub fn civil_to_ut(civil: NaiveDateTime, offset: FixedOffset) -> Option<NaiveDateTime> {
    truncate_to_minute(civil)
        .checked_sub_signed(Duration::seconds(i64::from(offset.local_minus_utc())))
}

fn day_zero() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1999, 12, 31)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Days since 2000 January 0.0 UT. 2000-01-01 12:00 UT is 1.5.
pub fn day_number(ut: NaiveDateTime) -> f64 {
    (ut - day_zero()).num_seconds() as f64 / 86_400.0
}

/// Fractional UT hour of day.
pub fn ut_hours(ut: NaiveDateTime) -> f64 {
    f64::from(ut.hour()) + f64::from(ut.minute()) / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn parses_common_offsets() {
        assert_eq!(parse_utc_offset("+05:30").unwrap().local_minus_utc(), 19_800);
        assert_eq!(parse_utc_offset("-0400").unwrap().local_minus_utc(), -14_400);
        assert_eq!(parse_utc_offset("+09").unwrap().local_minus_utc(), 32_400);
        assert_eq!(parse_utc_offset("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("z").unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn rejects_malformed_offsets() {
        assert!(parse_utc_offset("05:30").is_err());
        assert!(parse_utc_offset("+5:30").is_err());
        assert!(parse_utc_offset("+ab:cd").is_err());
        assert!(parse_utc_offset("+15:00").is_err());
        assert!(parse_utc_offset("Asia/Kolkata").is_err());
        assert!(parse_utc_offset("+05:30 IST").is_err());
    }

    #[test]
    fn civil_to_ut_shifts_and_truncates() {
        let ist = parse_utc_offset("+05:30").unwrap();
        let ut = civil_to_ut(dt(2024, 1, 2, 9, 15, 42), ist);
        assert_eq!(ut, Some(dt(2024, 1, 2, 3, 45, 0)));
    }

    #[test]
    fn civil_to_ut_crosses_midnight() {
        let ist = parse_utc_offset("+05:30").unwrap();
        assert_eq!(civil_to_ut(dt(2024, 1, 2, 1, 0, 0), ist), Some(dt(2024, 1, 1, 19, 30, 0)));
    }

    #[test]
    fn civil_to_ut_at_calendar_edges() {
        let west = parse_utc_offset("-05:00").unwrap();
        let east = parse_utc_offset("+05:30").unwrap();
        assert_eq!(civil_to_ut(NaiveDateTime::MAX, west), None);
        assert_eq!(civil_to_ut(NaiveDateTime::MIN, east), None);
        assert!(civil_to_ut(NaiveDateTime::MAX, east).is_some());
    }

    #[test]
    fn j2000_day_number() {
        assert_abs_diff_eq!(day_number(dt(2000, 1, 1, 12, 0, 0)), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn fractional_hours() {
        assert_abs_diff_eq!(ut_hours(dt(2024, 1, 2, 3, 45, 0)), 3.75, epsilon = 1e-12);
    }
}
