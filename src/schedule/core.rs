//! Background-thread job scheduling
//!
//! A [`Schedule`] runs one caller-supplied job on a dedicated thread according
//! to the earliest of its registered cadences. The loop polls at 1-second
//! granularity, interruptible by the forced-update event; job executions are
//! strictly serialized (the loop blocks on the job, there is no reentrancy).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Local};
use eyre::{Result, eyre};
use tracing::debug;

use super::cadence::Cadence;

/// Polling granularity of the waiting loop.
const TICK: Duration = Duration::from_secs(1);

/// The scheduled work: invoked synchronously on the scheduler thread, may
/// return a one-shot cadence ("run again after X") that competes with the
/// registered set for the next firing; this is the error-retry path. All
/// domain error handling belongs inside the job; an unhandled panic is fatal
/// and is propagated to the caller on [`Schedule::stop`].
pub type Job = Box<dyn FnMut() -> Option<Cadence> + Send>;

/// Lifecycle of a [`Schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Idle,
    Running,
    Stopped,
}

/// Manual-reset event with set / clear / interruptible timed wait, standing in
/// for the OS primitive the loop suspends on.
struct Event {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl Event {
    fn new() -> Self {
        Self {
            flag: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn set(&self) {
        *self.flag.lock().unwrap() = true;
        self.cond.notify_all();
    }

    /// Observe and reset in one step; returns whether the event was set.
    fn take(&self) -> bool {
        let mut flag = self.flag.lock().unwrap();
        std::mem::replace(&mut *flag, false)
    }

    fn is_set(&self) -> bool {
        *self.flag.lock().unwrap()
    }

    /// Wait until the event is set or `timeout` elapses; returns whether the
    /// event was set.
    fn wait(&self, timeout: Duration) -> bool {
        let flag = self.flag.lock().unwrap();
        let (flag, _) = self.cond.wait_timeout_while(flag, timeout, |set| !*set).unwrap();
        *flag
    }
}

/// Cross-thread signals: the force event is the only mutable state shared
/// between `force_update()` callers and the waiting loop.
struct Signals {
    running: AtomicBool,
    force: Event,
}

/// Log sinks, all invoked from the scheduler thread in a fixed order, so a
/// single-threaded consumer may mutate shared display state without locking.
struct Logs {
    update: Box<dyn Fn(bool) + Send>,
    next: Box<dyn Fn(DateTime<Local>) + Send>,
    left: Box<dyn Fn(f64) + Send>,
}

impl Default for Logs {
    fn default() -> Self {
        Self {
            update: Box::new(|_| {}),
            next: Box::new(|_| {}),
            left: Box::new(|_| {}),
        }
    }
}

/// Runs a job on a background thread on one or more recurring cadences.
///
/// ```no_run
/// use chrono::TimeDelta;
/// use ratewatch::schedule::{Cadence, Schedule};
///
/// let mut schedule = Schedule::new(|| None)
///     .on_next(|at| println!("next run at {at}"));
/// schedule.add(Cadence::every(1).days().at("08:00").jitter_add(TimeDelta::minutes(30)));
/// schedule.start(true).unwrap();
/// // ...
/// schedule.stop();
/// ```
pub struct Schedule {
    worker: Option<Worker>,
    handle: Option<JoinHandle<()>>,
    signals: Arc<Signals>,
    state: ScheduleState,
}

struct Worker {
    job: Job,
    logs: Logs,
    cadences: Vec<Cadence>,
    next_in: Option<Cadence>,
    signals: Arc<Signals>,
}

impl Schedule {
    pub fn new(job: impl FnMut() -> Option<Cadence> + Send + 'static) -> Self {
        let signals = Arc::new(Signals {
            running: AtomicBool::new(false),
            force: Event::new(),
        });
        Self {
            worker: Some(Worker {
                job: Box::new(job),
                logs: Logs::default(),
                cadences: Vec::new(),
                next_in: None,
                signals: Arc::clone(&signals),
            }),
            handle: None,
            signals,
            state: ScheduleState::Idle,
        }
    }

    /// Sink for "a run just started"; receives whether it was scheduled
    /// (natural cadence) or forced.
    pub fn on_update(mut self, sink: impl Fn(bool) + Send + 'static) -> Self {
        self.worker_mut().logs.update = Box::new(sink);
        self
    }

    /// Sink for "the next run is scheduled at ...".
    pub fn on_next(mut self, sink: impl Fn(DateTime<Local>) + Send + 'static) -> Self {
        self.worker_mut().logs.next = Box::new(sink);
        self
    }

    /// Sink for the live countdown, in seconds, clamped to >= 0. Emitted once
    /// per polling tick while waiting.
    pub fn on_left(mut self, sink: impl Fn(f64) + Send + 'static) -> Self {
        self.worker_mut().logs.left = Box::new(sink);
        self
    }

    /// Register a recurring cadence. All registered cadences are re-resolved
    /// after every run and the earliest firing wins the cycle.
    pub fn add(&mut self, cadence: Cadence) {
        debug!(%cadence, "Schedule::add: registering cadence");
        self.worker_mut().cadences.push(cadence);
    }

    fn worker_mut(&mut self) -> &mut Worker {
        self.worker.as_mut().expect("schedule already started")
    }

    /// Spawn the scheduler thread. With `right_now` the first cycle fires
    /// immediately instead of waiting for the earliest cadence.
    ///
    /// Errors when nothing has been scheduled or the schedule was already
    /// started.
    pub fn start(&mut self, right_now: bool) -> Result<()> {
        let worker = self.worker.take().ok_or_else(|| eyre!("schedule already started"))?;
        if worker.cadences.is_empty() {
            self.worker = Some(worker);
            return Err(eyre!("nothing has been scheduled"));
        }

        debug!(right_now, cadences = worker.cadences.len(), "Schedule::start: spawning worker");
        self.signals.running.store(true, Ordering::SeqCst);
        self.state = ScheduleState::Running;
        self.handle = Some(thread::spawn(move || worker.run(right_now)));
        Ok(())
    }

    /// Wake the loop and run the job immediately, regardless of remaining
    /// time. Idempotent while a forced run is already pending.
    pub fn force_update(&self) {
        debug!("Schedule::force_update: called");
        self.signals.force.set();
    }

    /// Request stop, wake the loop, and block until the thread has exited.
    /// An in-flight job execution is allowed to complete; no further one
    /// starts after this returns. A panic that escaped the job is resumed
    /// on the calling thread here.
    pub fn stop(&mut self) {
        if let Some(outcome) = self.shutdown() {
            if let Err(panic) = outcome {
                std::panic::resume_unwind(panic);
            }
        }
    }

    pub fn state(&self) -> ScheduleState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ScheduleState::Running
    }

    fn shutdown(&mut self) -> Option<thread::Result<()>> {
        let handle = self.handle.take()?;
        debug!("Schedule::stop: joining worker");
        self.signals.running.store(false, Ordering::SeqCst);
        self.signals.force.set();
        self.state = ScheduleState::Stopped;
        Some(handle.join())
    }
}

impl Drop for Schedule {
    fn drop(&mut self) {
        // same join as stop(), minus re-raising a job panic mid-unwind
        let _ = self.shutdown();
    }
}

impl Worker {
    fn run(mut self, right_now: bool) {
        self.resume_from_now(None, right_now);

        while self.signals.running.load(Ordering::SeqCst) {
            // the actual sleep happens inside the event wait
            if self.tick() || self.signals.force.wait(TICK) {
                if self.signals.running.load(Ordering::SeqCst) {
                    // observing the trigger resets it; a force raised during
                    // the job below survives into the next tick
                    let scheduled = !self.signals.force.take();
                    (self.logs.update)(scheduled);
                    debug!(scheduled, "Worker::run: invoking job");
                    let retry = (self.job)();
                    self.resume_from_now(retry, false);
                }
            }
        }
        debug!("Worker::run: exited");
    }

    /// Emit the countdown for this tick; true when the target time has passed.
    fn tick(&self) -> bool {
        let left = self
            .next_in
            .as_ref()
            .expect("worker always holds a resolved target")
            .seconds_left(Local::now());
        (self.logs.left)(left.max(0.0));
        left <= 0.0
    }

    /// Re-resolve every cadence (plus an optional job-returned one-shot)
    /// against now and target the earliest. With `right_now` the force event
    /// short-circuits the next wait instead of announcing a target; a forced
    /// update requested meanwhile suppresses the announcement and takes
    /// precedence on the next tick.
    fn resume_from_now(&mut self, extra: Option<Cadence>, right_now: bool) {
        let now = Local::now();
        let mut nexts = self.cadences.clone();
        nexts.extend(extra);

        let mut target: Option<Cadence> = None;
        for mut cadence in nexts {
            cadence.resolve(now);
            let sooner = match &target {
                Some(best) => cadence.seconds_left(now) < best.seconds_left(now),
                None => true,
            };
            if sooner {
                target = Some(cadence);
            }
        }
        self.next_in = target;

        if right_now {
            self.signals.force.set();
        } else if !self.signals.force.is_set() {
            let fire_at = self
                .next_in
                .as_ref()
                .and_then(Cadence::fire_at)
                .expect("cadence set is never empty after start");
            debug!(%fire_at, "Worker::resume_from_now: next run");
            (self.logs.next)(fire_at);
        }
    }
}
