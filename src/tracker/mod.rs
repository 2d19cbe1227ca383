//! Accrual-rate tracking over noisy, irregularly-sampled observations
//!
//! A bounded time-series accumulator: samples are appended once per
//! observation cycle, the history is compacted under retention and validity
//! rules, and a smoothed per-day rate is derived net of one-off events.

mod history;
mod sample;

pub use history::RateTracker;
pub use sample::Sample;
