//! Recurring-cadence specification and resolution
//!
//! A [`Cadence`] is "run every X, optionally at a fixed time of day,
//! optionally jittered", resolved on demand into a concrete next-firing
//! instant. Misconfiguration is a programming error and fails fast with a
//! panic; resolution itself cannot fail.

use std::fmt;

use chrono::{DateTime, Local, NaiveTime, TimeDelta};
use rand::Rng;

use crate::fmt::humanize;

/// Which randomization applies to the resolved firing time.
///
/// Exactly one mode is active at a time; the latest builder call wins.
/// Additive jitter samples in `[0, magnitude]`, symmetric in
/// `[-magnitude, +magnitude]`, percent in `±percent%` of the base duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JitterMode {
    None,
    Symmetric,
    Additive,
    Percent(f64),
}

impl JitterMode {
    /// Multiplier bounds applied to the jitter magnitude.
    fn bounds(self) -> (f64, f64) {
        match self {
            JitterMode::None => (0.0, 0.0),
            JitterMode::Symmetric => (-1.0, 1.0),
            JitterMode::Additive => (0.0, 1.0),
            JitterMode::Percent(percent) => (-percent / 100.0, percent / 100.0),
        }
    }
}

/// Builder seed returned by [`Cadence::every`]; the unit method fixes the
/// base duration.
#[derive(Debug, Clone, Copy)]
pub struct Every(i64);

impl Every {
    pub fn days(self) -> Cadence {
        Cadence::with_base(TimeDelta::days(self.0))
    }

    pub fn hours(self) -> Cadence {
        Cadence::with_base(TimeDelta::hours(self.0))
    }

    pub fn minutes(self) -> Cadence {
        Cadence::with_base(TimeDelta::minutes(self.0))
    }

    pub fn seconds(self) -> Cadence {
        Cadence::with_base(TimeDelta::seconds(self.0))
    }
}

/// One recurring-schedule specification: base interval, optional time-of-day
/// anchor, and jitter. `resolve` recomputes the concrete firing instant every
/// cycle.
#[derive(Debug, Clone)]
pub struct Cadence {
    base: TimeDelta,
    at_hour: Option<NaiveTime>,
    jitter: TimeDelta,
    mode: JitterMode,
    fire_at: Option<DateTime<Local>>,
}

impl Cadence {
    /// Start building a cadence: `Cadence::every(3).hours()`.
    ///
    /// Panics when `amount` is not strictly positive.
    pub fn every(amount: i64) -> Every {
        assert!(amount > 0, "cadence amount must be > 0");
        Every(amount)
    }

    fn with_base(base: TimeDelta) -> Self {
        Self {
            base,
            at_hour: None,
            jitter: TimeDelta::zero(),
            mode: JitterMode::None,
            fire_at: None,
        }
    }

    /// Anchor the firing time to a wall-clock "HH:MM" on the current or next
    /// applicable day. Meant for whole-day cadences ("once daily at 08:00").
    ///
    /// Panics on malformed input.
    pub fn at(mut self, hhmm: &str) -> Self {
        self.at_hour = Some(parse_hhmm(hhmm));
        self
    }

    /// One-sided jitter spanning from the `at` anchor up to `hhmm`.
    ///
    /// Panics when `at` has not been set or `hhmm` is earlier than the anchor.
    pub fn to(mut self, hhmm: &str) -> Self {
        let at_hour = self.at_hour.expect("at(hour) must be set before to(hour)");
        let span = parse_hhmm(hhmm) - at_hour;
        assert!(span >= TimeDelta::zero(), "to(hour) must not be earlier than at(hour)");
        self.jitter = span;
        self.mode = JitterMode::Additive;
        self
    }

    /// Symmetric jitter: the firing time moves by up to ±`magnitude`.
    pub fn jitter(mut self, magnitude: TimeDelta) -> Self {
        assert!(magnitude >= TimeDelta::zero(), "jitter magnitude must be >= 0");
        self.jitter = magnitude;
        self.mode = JitterMode::Symmetric;
        self
    }

    /// One-sided additive jitter: the firing time moves by 0..`magnitude`.
    pub fn jitter_add(mut self, magnitude: TimeDelta) -> Self {
        assert!(magnitude >= TimeDelta::zero(), "jitter magnitude must be >= 0");
        self.jitter = magnitude;
        self.mode = JitterMode::Additive;
        self
    }

    /// Symmetric jitter of ±`percent`% of the base duration.
    pub fn jitter_percent(mut self, percent: f64) -> Self {
        assert!(percent >= 0.0, "jitter percent must be >= 0");
        self.jitter = self.base;
        self.mode = JitterMode::Percent(percent);
        self
    }

    /// Resolve the specification against `now` into a concrete firing instant.
    ///
    /// The base instant is the `at` anchor on `now`'s date when set, otherwise
    /// `now + base`. The base is advanced by whole intervals until even the
    /// minimum-jitter outcome is not in the past (catching up after the
    /// process slept past a scheduled time), then a uniformly sampled jitter
    /// is applied. The result is stored for [`fire_at`](Self::fire_at) and
    /// [`seconds_left`](Self::seconds_left).
    pub fn resolve(&mut self, now: DateTime<Local>) -> DateTime<Local> {
        let mut date = match self.at_hour {
            Some(at_hour) => now
                .with_time(at_hour)
                .earliest()
                .unwrap_or(now + self.base),
            None => now + self.base,
        };

        let (lower, upper) = self.mode.bounds();
        let min_jitter = scale(self.jitter, lower);
        while date + min_jitter < now {
            date += self.base;
        }

        let factor = rand::rng().random_range(lower..=upper);
        date += scale(self.jitter, factor);

        self.fire_at = Some(date);
        date
    }

    /// The instant produced by the last [`resolve`](Self::resolve), if any.
    pub fn fire_at(&self) -> Option<DateTime<Local>> {
        self.fire_at
    }

    /// Seconds from `now` until the resolved firing instant (negative when it
    /// has already passed).
    ///
    /// Panics when the cadence has not been resolved yet.
    pub fn seconds_left(&self, now: DateTime<Local>) -> f64 {
        let fire_at = self.fire_at.expect("resolve() must be called before seconds_left()");
        (fire_at - now).num_milliseconds() as f64 / 1_000.0
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = humanize(self.base);
        let base = match base.strip_prefix("1 ") {
            Some(unit) if !base.contains(',') => unit,
            _ => base.as_str(),
        };
        write!(f, "Every {base}")?;

        if let Some(at_hour) = self.at_hour {
            write!(f, " at {}", at_hour.format("%H:%M"))?;
        }

        let (lower, upper) = self.mode.bounds();
        let spread = scale(self.jitter, upper);
        if spread > TimeDelta::zero() {
            let sign = if lower == 0.0 { '+' } else { '±' };
            write!(f, " ~ {sign}{}", humanize(spread))?;
        }
        Ok(())
    }
}

fn parse_hhmm(hhmm: &str) -> NaiveTime {
    NaiveTime::parse_from_str(hhmm, "%H:%M").expect("time of day must be formatted HH:MM")
}

/// Multiply a duration by a float, rounded to whole milliseconds.
/// Rounding is monotone, so ordering of scaled values follows the factors.
fn scale(delta: TimeDelta, factor: f64) -> TimeDelta {
    TimeDelta::milliseconds((delta.num_milliseconds() as f64 * factor).round() as i64)
}
