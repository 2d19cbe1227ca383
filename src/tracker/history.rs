//! Bounded history of cumulative observations and the smoothed daily rate
//!
//! The tracker ingests one sample per observation cycle, derives a per-day
//! accrual rate net of one-off event spikes, and compacts its history under
//! retention, merge and consistency rules. It has no concurrency of its own:
//! callers invoke it synchronously from inside a single job execution.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sample::Sample;

pub(crate) const SECONDS_PER_HOUR: f64 = 3_600.0;
pub(crate) const SECONDS_PER_DAY: f64 = 24.0 * SECONDS_PER_HOUR;

/// Chronologically ordered, append-only sequence of [`Sample`]s.
///
/// Persisted as a plain sequence of samples; the (de)serializing collaborator
/// owns the format. The expected cycle is `append`, then `compact`, then
/// `rate`, once per observation.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateTracker {
    samples: Vec<Sample>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the retained history, oldest first.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Append a sample if its timestamp is strictly after the last stored one.
    ///
    /// Out-of-order or duplicate-timestamp observations are expected from live
    /// scraping and are silently ignored so they cannot corrupt ordering.
    pub fn append(&mut self, sample: Sample) {
        if let Some(last) = self.samples.last() {
            if sample.at <= last.at {
                debug!(at = %sample.at, last = %last.at, "RateTracker::append: ignoring out-of-order sample");
                return;
            }
        }
        self.samples.push(sample);
    }

    /// Smoothed accrual rate in value per day over the whole retained window,
    /// net of event contributions.
    ///
    /// Returns `None` while the window spans less than `min_window_hours`;
    /// callers fall back to a previously known rate or zero.
    pub fn rate(&self, min_window_hours: f64) -> Option<f64> {
        if self.samples.len() < 2 {
            return None;
        }

        let mut elapsed = 0.0;
        let mut delta = 0.0;
        for pair in self.samples.windows(2) {
            elapsed += Sample::seconds_between(&pair[0], &pair[1]);
            delta += pair[1].total - pair[0].total - pair[1].event_delta;
        }

        if elapsed >= min_window_hours * SECONDS_PER_HOUR {
            Some(delta * SECONDS_PER_DAY / elapsed)
        } else {
            None
        }
    }

    /// Compact the history: three passes, each potentially truncating the
    /// front of the sequence. A non-empty history stays non-empty and stays
    /// chronologically ordered.
    pub fn compact(&mut self, retention_days: f64, merge_threshold_hours: f64) {
        if self.samples.len() < 2 {
            return;
        }
        let before = self.samples.len();

        self.retain_recent(retention_days * SECONDS_PER_DAY);
        self.merge(merge_threshold_hours * SECONDS_PER_HOUR);
        self.drop_broken_prefix();

        if self.samples.len() != before {
            debug!(before, after = self.samples.len(), "RateTracker::compact: history truncated");
        }
    }

    /// Pass 1: walking pairs from the newest end backward, accumulate elapsed
    /// time; once it reaches the retention horizon, drop everything strictly
    /// older than that pair's earlier endpoint.
    fn retain_recent(&mut self, horizon_seconds: f64) {
        let mut elapsed = 0.0;
        for i in (1..self.samples.len()).rev() {
            elapsed += Sample::seconds_between(&self.samples[i - 1], &self.samples[i]);
            if elapsed >= horizon_seconds {
                self.samples.drain(..i - 1);
                break;
            }
        }
    }

    /// Pass 2: keep a sample only if it carries an event (`event_delta > 0`)
    /// or the accumulated gap since the last kept sample reaches the merge
    /// threshold. The final sample is always retained as the anchor for
    /// future comparisons.
    fn merge(&mut self, threshold_seconds: f64) {
        let mut kept = vec![self.samples[0]];
        let mut elapsed = 0.0;
        for i in 1..self.samples.len() {
            elapsed += Sample::seconds_between(&self.samples[i - 1], &self.samples[i]);
            if self.samples[i].event_delta > 0.0 || elapsed >= threshold_seconds {
                kept.push(self.samples[i]);
                elapsed = 0.0;
            }
        }

        let newest = self.samples[self.samples.len() - 1];
        if kept.last() != Some(&newest) {
            kept.push(newest);
        }
        self.samples = kept;
    }

    /// Pass 3: walking pairs from the newest end backward, truncate everything
    /// up to and including the first pair that breaks rate computation:
    /// a one-calendar-day gap with no event at the later sample (a missed
    /// observation), a negative value delta (the counter went down), or a gap
    /// spanning more than one calendar day. The retained history restarts at
    /// the later sample of the broken pair.
    fn drop_broken_prefix(&mut self) {
        for i in (1..self.samples.len()).rev() {
            let (begin, end) = (self.samples[i - 1], self.samples[i]);
            let cross_days = Sample::whole_days_between(&begin, &end);
            let missed_event = cross_days == 1 && end.event_delta == 0.0;
            let went_down = end.total - begin.total < 0.0;
            if missed_event || went_down || cross_days > 1 {
                self.samples.drain(..i);
                break;
            }
        }
    }
}
