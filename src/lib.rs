//! ratewatch - self-adjusting recurring-job scheduling with accrual-rate tracking
//!
//! ratewatch pairs a recurring-job scheduler with a bounded time-series
//! accumulator. The scheduler runs one job on a dedicated background thread
//! on jittered cadences; the job feeds cumulative observations into the
//! tracker, which derives a smoothed per-day accrual rate from a noisy,
//! irregularly-sampled stream and keeps its history compact.
//!
//! # Core Concepts
//!
//! - **Single-flight**: job executions are totally ordered; the loop blocks
//!   on the job and never overlaps runs
//! - **Self-adjusting**: the next firing is recomputed after every run, and
//!   the job may return a one-shot retry cadence that competes for "earliest"
//! - **Forward progress**: a resolved firing instant is never in the past,
//!   even at minimum jitter
//! - **Noise-tolerant**: out-of-order samples are no-ops, event spikes are
//!   subtracted from the rate, broken history segments are excised
//!
//! # Modules
//!
//! - [`schedule`] - Cadence specification and the background-thread loop
//! - [`tracker`] - Sample history, smoothed rate, three-pass compaction
//! - [`config`] - Typed nested settings loaded from YAML
//! - [`fmt`] - Human-readable cadence and countdown rendering

pub mod config;
pub mod fmt;
pub mod schedule;
pub mod tracker;

// Re-export commonly used types
pub use config::{Config, ScheduleConfig, TrackerConfig};
pub use schedule::{Cadence, Schedule, ScheduleState};
pub use tracker::{RateTracker, Sample};
