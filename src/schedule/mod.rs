//! Self-adjusting recurring-job scheduling
//!
//! [`Cadence`] is the specification language ("every N units, at HH:MM,
//! jittered"); [`Schedule`] runs a job on a dedicated background thread on
//! the earliest of its registered cadences, with forced immediate runs and
//! job-driven rescheduling.

mod cadence;
mod core;

pub use cadence::{Cadence, Every, JitterMode};
pub use core::{Job, Schedule, ScheduleState};
