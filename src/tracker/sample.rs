//! Observation records for the rate tracker

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One observation in the tracker's history.
///
/// `total` is the cumulative running value at the observation instant;
/// `event_delta` is the portion of the last increase attributable to a
/// discrete event tied to that exact instant (0 when none occurred).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub at: DateTime<Local>,
    pub total: f64,
    pub event_delta: f64,
}

impl Sample {
    pub fn new(at: DateTime<Local>, total: f64, event_delta: f64) -> Self {
        Self { at, total, event_delta }
    }

    /// Elapsed seconds from `begin` to `end`.
    pub(crate) fn seconds_between(begin: &Sample, end: &Sample) -> f64 {
        (end.at - begin.at).num_milliseconds() as f64 / 1_000.0
    }

    /// Calendar-day difference between the two observation dates.
    ///
    /// This is a date difference, not elapsed hours: 23:59 to 00:01 the next
    /// morning counts as one whole day.
    pub(crate) fn whole_days_between(begin: &Sample, end: &Sample) -> i64 {
        (end.at.date_naive() - begin.at.date_naive()).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Sample {
        Sample::new(Local.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap(), 0.0, 0.0)
    }

    #[test]
    fn test_seconds_between() {
        let a = sample(2026, 1, 10, 8, 0);
        let b = sample(2026, 1, 10, 9, 30);
        assert_eq!(Sample::seconds_between(&a, &b), 5_400.0);
    }

    #[test]
    fn test_whole_days_is_calendar_based() {
        let a = sample(2026, 1, 10, 23, 59);
        let b = sample(2026, 1, 11, 0, 1);
        assert_eq!(Sample::whole_days_between(&a, &b), 1);

        let a = sample(2026, 1, 10, 0, 1);
        let b = sample(2026, 1, 10, 23, 59);
        assert_eq!(Sample::whole_days_between(&a, &b), 0);
    }

    #[test]
    fn test_sample_roundtrips_through_serde() {
        let a = Sample::new(Local.with_ymd_and_hms(2026, 2, 1, 8, 15, 0).unwrap(), 1_234.5, 10.0);
        let json = serde_json::to_string(&a).unwrap();
        let back: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }
}
