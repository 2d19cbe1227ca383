//! Human-readable rendering of durations and countdowns
//!
//! These strings are part of the contract with the log-consuming layer: the
//! cadence description ("Every day at 08:00 ~ +30 minutes") and the live
//! countdown ("in 1h02:03") are displayed verbatim.

use chrono::TimeDelta;

const UNITS: [(i64, &str); 5] = [
    (365 * 86_400, "year"),
    (86_400, "day"),
    (3_600, "hour"),
    (60, "minute"),
    (1, "second"),
];

fn plural(unit: &str, value: i64) -> String {
    if value > 1 { format!("{unit}s") } else { unit.to_string() }
}

/// Render a duration as a comma-separated list of non-zero components,
/// largest first, with years folded in above 365 days.
///
/// `humanize` rounds to whole seconds; a sub-second duration renders as
/// "0 seconds".
pub fn humanize(delta: TimeDelta) -> String {
    let mut left = delta.num_milliseconds().max(0) as f64 / 1_000.0;
    left = left.round();

    let mut parts = Vec::new();
    for (seconds, unit) in UNITS {
        let value = (left / seconds as f64).floor() as i64;
        if value != 0 {
            parts.push(format!("{value} {}", plural(unit, value)));
            left -= (value * seconds) as f64;
        }
    }

    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(", ")
    }
}

/// Render a number of seconds as the countdown string the presentation layer
/// shows next to the update button, e.g. "in 1h02:03" or
/// "in 2 days, 0h15:00 (ERROR)" when the owning application has flagged the
/// active state as errored.
pub fn countdown(seconds: f64, errored: bool) -> String {
    let total = seconds.max(0.0).round() as i64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let secs = total % 60;

    let mut txt = String::from("in ");
    if days > 0 {
        txt.push_str(&format!("{days} {}, ", plural("day", days)));
    }
    txt.push_str(&format!("{hours}h{minutes:02}:{secs:02}"));
    if errored {
        txt.push_str(" (ERROR)");
    }
    txt
}
