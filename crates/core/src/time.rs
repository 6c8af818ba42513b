use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::error::{CostError, Result};

/// Source of wall-clock time for the store. Injected so windows and
/// retention can be exercised deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Storage keeps microsecond precision; truncate up front so a row reads
/// back with the exact timestamp it was written with.
pub fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(ts.timestamp_micros()).unwrap_or(ts)
}

/// Earliest cutoff a lookback window can reach. Wider windows saturate here.
pub fn window_floor() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(DateTime::<Utc>::MIN_UTC, |n| n.and_utc())
}

pub fn hours_before(now: DateTime<Utc>, hours: u32) -> DateTime<Utc> {
    lookback(now, TimeDelta::try_hours(i64::from(hours)))
}

pub fn days_before(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    lookback(now, TimeDelta::try_days(i64::from(days)))
}

fn lookback(now: DateTime<Utc>, window: Option<TimeDelta>) -> DateTime<Utc> {
    let floor = window_floor();
    window
        .and_then(|w| now.checked_sub_signed(w))
        .map_or(floor, |cutoff| cutoff.max(floor))
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| CostError::Config(format!("invalid duration {input}: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn truncates_sub_microsecond_precision() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let truncated = truncate_to_micros(ts);
        assert_eq!(truncated.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn window_helpers_subtract() {
        let now = Utc.with_ymd_and_hms(2026, 2, 2, 12, 0, 0).unwrap();
        assert_eq!(hours_before(now, 24), Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap());
        assert_eq!(days_before(now, 0), now);
        assert_eq!(days_before(now, 1), Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn oversized_windows_saturate_at_floor() {
        let now = Utc.with_ymd_and_hms(2026, 2, 2, 12, 0, 0).unwrap();
        assert_eq!(hours_before(now, u32::MAX), window_floor());
        assert_eq!(days_before(now, u32::MAX), window_floor());
        assert_eq!(window_floor(), Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration_str("5m").unwrap(), Duration::from_secs(300));
        assert!(parse_duration_str("soon").is_err());
    }
}
