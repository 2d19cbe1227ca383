//! Integration tests for the live scheduler loop
//!
//! These exercise the background thread end to end: forced updates, natural
//! cadences, retry directives, single-flight execution and clean shutdown.
//! Cadences are second-granular to keep the 1-second polling loop fast enough
//! to observe.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use chrono::Local;
use ratewatch::schedule::{Cadence, Schedule, ScheduleState};

#[test]
fn test_forced_update_preempts_wait() {
    let (ran_tx, ran_rx) = mpsc::channel();
    let mut schedule = Schedule::new(move || {
        ran_tx.send(()).unwrap();
        None
    });
    schedule.add(Cadence::every(1).days());
    schedule.start(false).unwrap();

    // nothing should fire on its own for a day
    assert!(ran_rx.recv_timeout(Duration::from_millis(300)).is_err());

    schedule.force_update();
    ran_rx
        .recv_timeout(Duration::from_secs(3))
        .expect("forced update should run the job within one polling tick");
    schedule.stop();
}

#[test]
fn test_start_right_now_fires_immediately_as_forced() {
    let (ran_tx, ran_rx) = mpsc::channel();
    let (update_tx, update_rx) = mpsc::channel();
    let mut schedule = Schedule::new(move || {
        ran_tx.send(()).unwrap();
        None
    })
    .on_update(move |scheduled| update_tx.send(scheduled).unwrap());
    schedule.add(Cadence::every(1).days());
    schedule.start(true).unwrap();

    ran_rx.recv_timeout(Duration::from_secs(3)).expect("immediate run");
    let scheduled = update_rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(!scheduled, "an immediate start counts as a forced run");
    schedule.stop();
}

#[test]
fn test_natural_cadence_fires_as_scheduled() {
    let (update_tx, update_rx) = mpsc::channel();
    let mut schedule = Schedule::new(|| None).on_update(move |scheduled| update_tx.send(scheduled).unwrap());
    schedule.add(Cadence::every(1).seconds());
    schedule.start(false).unwrap();

    let scheduled = update_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(scheduled, "a cadence-driven run counts as scheduled");
    schedule.stop();
}

#[test]
fn test_stop_is_clean() {
    let runs = Arc::new(AtomicUsize::new(0));
    let job_runs = Arc::clone(&runs);
    let mut schedule = Schedule::new(move || {
        job_runs.fetch_add(1, Ordering::SeqCst);
        None
    });
    schedule.add(Cadence::every(1).seconds());
    schedule.start(true).unwrap();

    while runs.load(Ordering::SeqCst) == 0 {
        std::thread::sleep(Duration::from_millis(20));
    }
    schedule.stop();
    assert_eq!(schedule.state(), ScheduleState::Stopped);

    // the thread has exited: no further invocations can happen
    let after_stop = runs.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(2_500));
    assert_eq!(runs.load(Ordering::SeqCst), after_stop);
}

#[test]
fn test_job_executions_never_overlap() {
    let in_flight = Arc::new(AtomicBool::new(false));
    let overlapped = Arc::new(AtomicBool::new(false));
    let runs = Arc::new(AtomicUsize::new(0));

    let (job_guard, job_overlap, job_runs) = (Arc::clone(&in_flight), Arc::clone(&overlapped), Arc::clone(&runs));
    let mut schedule = Schedule::new(move || {
        if job_guard.swap(true, Ordering::SeqCst) {
            job_overlap.store(true, Ordering::SeqCst);
        }
        // outlive the polling tick so a reentrant scheduler would overlap here
        std::thread::sleep(Duration::from_millis(1_200));
        job_guard.store(false, Ordering::SeqCst);
        job_runs.fetch_add(1, Ordering::SeqCst);
        None
    });
    schedule.add(Cadence::every(1).seconds());
    schedule.start(true).unwrap();

    std::thread::sleep(Duration::from_secs(5));
    schedule.stop();

    assert!(runs.load(Ordering::SeqCst) >= 2, "cadence should keep firing");
    assert!(!overlapped.load(Ordering::SeqCst), "job executions must be serialized");
}

#[test]
fn test_job_retry_directive_reschedules_sooner() {
    let runs = Arc::new(AtomicUsize::new(0));
    let job_runs = Arc::clone(&runs);
    let (update_tx, update_rx) = mpsc::channel();

    let mut schedule = Schedule::new(move || {
        // first run "fails" and asks to be retried in a second; a day-long
        // cadence alone would never fire again within this test
        if job_runs.fetch_add(1, Ordering::SeqCst) == 0 {
            Some(Cadence::every(1).seconds())
        } else {
            None
        }
    })
    .on_update(move |scheduled| update_tx.send(scheduled).unwrap());
    schedule.add(Cadence::every(1).days());
    schedule.start(true).unwrap();

    let first = update_rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert!(!first, "startup run is forced");
    let second = update_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(second, "the retry fires as a scheduled run");

    // the update signal precedes the job invocation, so give the second
    // execution time to reach the counter
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while runs.load(Ordering::SeqCst) < 2 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(runs.load(Ordering::SeqCst) >= 2);
    schedule.stop();
}

#[test]
fn test_force_requested_during_job_takes_precedence() {
    let (started_tx, started_rx) = mpsc::channel();
    let mut schedule = Schedule::new(move || {
        started_tx.send(()).unwrap();
        // stay in the job long enough for the main thread to request a force
        std::thread::sleep(Duration::from_millis(1_500));
        None
    });
    schedule.add(Cadence::every(1).days());
    schedule.start(true).unwrap();

    started_rx.recv_timeout(Duration::from_secs(3)).expect("first run");
    schedule.force_update();

    // the request raised mid-execution survives rescheduling and fires next
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("forced update requested during a run triggers a follow-up run");
    schedule.stop();
}

#[test]
fn test_countdown_and_next_announcements() {
    let (left_tx, left_rx) = mpsc::channel();
    let (next_tx, next_rx) = mpsc::channel();
    let mut schedule = Schedule::new(|| None)
        .on_left(move |seconds| left_tx.send(seconds).unwrap())
        .on_next(move |at| next_tx.send(at).unwrap());
    schedule.add(Cadence::every(1).days());
    schedule.start(false).unwrap();

    let announced = next_rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert!(announced > Local::now(), "next run is announced in the future");

    let left = left_rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert!(left >= 0.0, "countdown is clamped to >= 0");
    assert!(left <= 86_400.0, "countdown reflects the day-long cadence");
    schedule.stop();
}
