//! Integration tests for the timer scheduler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use steward_bin::Signal;
use steward_timer::{TimerError, TimerScheduler, TimerSpec};

fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    (count, move || {
        c.fetch_add(1, Ordering::SeqCst);
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Completion
// ═══════════════════════════════════════════════════════════════════════════════

/// A one-shot timer fires once and is removed.
#[test]
fn one_shot_fires_once_and_is_removed() {
    let scheduler = TimerScheduler::new();
    let (fired, on_complete) = counter();
    scheduler
        .start("once", TimerSpec::new(2.0).on_complete(on_complete))
        .unwrap();

    scheduler.update(1.0);
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    scheduler.update(1.0);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!scheduler.contains("once"));

    scheduler.update(5.0);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

/// A looped timer wraps with its overshoot and keeps running.
#[test]
fn looped_timer_wraps_with_overshoot() {
    let scheduler = TimerScheduler::new();
    let (fired, on_complete) = counter();
    scheduler
        .start(
            "loop",
            TimerSpec::new(10.0).looped(true).on_complete(on_complete),
        )
        .unwrap();

    scheduler.update(4.0);
    scheduler.update(4.0);
    scheduler.update(4.0);

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.state("loop").unwrap().elapsed, 2.0);

    scheduler.update(8.0);
    assert_eq!(fired.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.state("loop").unwrap().elapsed, 0.0);
}

/// A timer without a completion callback still completes.
#[test]
fn timer_without_callback_completes() {
    let scheduler = TimerScheduler::new();
    scheduler.start("silent", TimerSpec::new(1.0)).unwrap();
    scheduler.update(1.0);
    assert!(scheduler.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════════
// Progress Ticks
// ═══════════════════════════════════════════════════════════════════════════════

/// Several intervals elapsing in one update fire the same number of ticks.
#[test]
fn on_tick_fires_per_elapsed_interval() {
    let scheduler = TimerScheduler::new();
    let ticks = Arc::new(Mutex::new(Vec::new()));
    let t = Arc::clone(&ticks);
    scheduler
        .start(
            "progress",
            TimerSpec::new(10.0)
                .tick_interval(1.0)
                .on_tick(move |elapsed, remaining| t.lock().push((elapsed, remaining))),
        )
        .unwrap();

    scheduler.update(2.5);
    assert_eq!(ticks.lock().len(), 2);
    assert_eq!(scheduler.state("progress").unwrap().tick_accumulator, 0.5);

    scheduler.update(0.5);
    assert_eq!(*ticks.lock(), vec![(2.5, 7.5), (2.5, 7.5), (3.0, 7.0)]);
    assert_eq!(scheduler.state("progress").unwrap().tick_accumulator, 0.0);
}

/// Remaining time passed to `on_tick` is clamped at zero.
#[test]
fn on_tick_remaining_never_negative() {
    let scheduler = TimerScheduler::new();
    let remaining = Arc::new(Mutex::new(Vec::new()));
    let r = Arc::clone(&remaining);
    scheduler
        .start(
            "short",
            TimerSpec::new(1.0).on_tick(move |_, left| r.lock().push(left)),
        )
        .unwrap();

    scheduler.update(3.0);

    assert_eq!(*remaining.lock(), vec![0.0, 0.0, 0.0]);
}

/// Updates spanning an enormous number of intervals return promptly.
#[test]
fn huge_delta_returns_promptly() {
    let scheduler = TimerScheduler::new();
    let (completed, on_complete) = counter();
    let (ticks, on_tick) = counter();
    scheduler
        .start("plain", TimerSpec::new(5.0).on_complete(on_complete))
        .unwrap();
    scheduler
        .start("looped", TimerSpec::new(5.0).looped(true))
        .unwrap();
    scheduler
        .start(
            "progress",
            TimerSpec::new(1e30)
                .tick_interval(1e-9)
                .on_tick(move |_, _| on_tick()),
        )
        .unwrap();

    let (done, finished) = mpsc::channel();
    let worker = scheduler.clone();
    thread::spawn(move || {
        worker.update(1e16);
        let _ = done.send(());
    });

    assert!(finished.recv_timeout(Duration::from_secs(5)).is_ok());
    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert!(!scheduler.contains("plain"));
    assert!(scheduler.contains("looped"));
    assert!(ticks.load(Ordering::SeqCst) > 0);
    let state = scheduler.state("progress").unwrap();
    assert!(state.tick_accumulator < state.tick_interval);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Control
// ═══════════════════════════════════════════════════════════════════════════════

/// Pausing freezes elapsed time and the tick accumulator.
#[test]
fn pause_freezes_progress() {
    let scheduler = TimerScheduler::new();
    let (ticks, on_tick) = counter();
    scheduler
        .start(
            "p",
            TimerSpec::new(10.0)
                .tick_interval(2.0)
                .on_tick(move |_, _| on_tick()),
        )
        .unwrap();

    scheduler.update(1.0);
    assert!(scheduler.pause("p"));
    for _ in 0..5 {
        scheduler.update(3.0);
    }

    let state = scheduler.state("p").unwrap();
    assert!(state.paused);
    assert_eq!(state.elapsed, 1.0);
    assert_eq!(state.tick_accumulator, 1.0);
    assert_eq!(ticks.load(Ordering::SeqCst), 0);

    assert!(scheduler.resume("p"));
    scheduler.update(1.0);
    assert_eq!(scheduler.state("p").unwrap().elapsed, 2.0);
    assert_eq!(ticks.load(Ordering::SeqCst), 1);
}

/// Cancelling removes the timer without running its callback.
#[test]
fn cancel_skips_callback() {
    let scheduler = TimerScheduler::new();
    let (fired, on_complete) = counter();
    scheduler
        .start("c", TimerSpec::new(1.0).on_complete(on_complete))
        .unwrap();

    assert!(scheduler.cancel("c"));
    scheduler.update(2.0);

    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert!(!scheduler.cancel("c"));
}

/// Unknown ids are no-ops.
#[test]
fn unknown_ids_are_ignored() {
    let scheduler = TimerScheduler::new();
    assert!(!scheduler.cancel("missing"));
    assert!(!scheduler.pause("missing"));
    assert!(!scheduler.resume("missing"));
    assert!(scheduler.state("missing").is_none());
}

/// Starting over an existing id replaces it and resets its progress.
#[test]
fn start_overwrites_existing_id() {
    let scheduler = TimerScheduler::new();
    let (first, first_cb) = counter();
    let (second, second_cb) = counter();
    scheduler
        .start("t", TimerSpec::new(2.0).on_complete(first_cb))
        .unwrap();
    scheduler.update(1.5);

    scheduler
        .start("t", TimerSpec::new(2.0).on_complete(second_cb))
        .unwrap();
    assert_eq!(scheduler.len(), 1);
    assert_eq!(scheduler.state("t").unwrap().elapsed, 0.0);

    scheduler.update(2.0);
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

/// Invalid durations and intervals are rejected.
#[test]
fn start_rejects_invalid_specs() {
    let scheduler = TimerScheduler::new();
    assert_eq!(
        scheduler.start("a", TimerSpec::new(-2.0)),
        Err(TimerError::InvalidDuration(-2.0))
    );
    assert_eq!(
        scheduler.start("b", TimerSpec::new(1.0).tick_interval(-1.0)),
        Err(TimerError::InvalidTickInterval(-1.0))
    );
    assert!(scheduler.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════════
// Failure Isolation
// ═══════════════════════════════════════════════════════════════════════════════

/// A panicking callback does not stop other timers or later updates.
#[test]
fn failing_callback_is_isolated() {
    let scheduler = TimerScheduler::new();
    let (fired, on_complete) = counter();
    scheduler
        .start(
            "bad",
            TimerSpec::new(1.0)
                .looped(true)
                .on_complete(|| panic!("callback failed")),
        )
        .unwrap();
    scheduler
        .start("good", TimerSpec::new(1.0).on_complete(on_complete))
        .unwrap();

    scheduler.update(1.0);

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(scheduler.contains("bad"));
    scheduler.update(0.5);
    assert_eq!(scheduler.state("bad").unwrap().elapsed, 0.5);
}

/// Callbacks may start and cancel timers on the same scheduler.
#[test]
fn callbacks_may_reenter_scheduler() {
    let scheduler = TimerScheduler::new();
    let (chained, chained_cb) = counter();
    let chained_cb = Arc::new(chained_cb);

    let s = scheduler.clone();
    scheduler
        .start(
            "first",
            TimerSpec::new(1.0).on_complete(move || {
                s.cancel("victim");
                let cb = Arc::clone(&chained_cb);
                s.start("second", TimerSpec::new(1.0).on_complete(move || cb()))
                    .unwrap();
            }),
        )
        .unwrap();
    scheduler.start("victim", TimerSpec::new(5.0)).unwrap();

    scheduler.update(1.0);
    assert!(!scheduler.contains("victim"));
    assert!(scheduler.contains("second"));

    scheduler.update(1.0);
    assert_eq!(chained.load(Ordering::SeqCst), 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tick Source & Destroy
// ═══════════════════════════════════════════════════════════════════════════════

/// An attached scheduler advances on every frame signal.
#[test]
fn attached_scheduler_follows_frames() {
    let frame = Signal::<f64>::new();
    let scheduler = TimerScheduler::new();
    scheduler.attach(&frame).unwrap();
    assert!(scheduler.is_attached());
    scheduler.start("t", TimerSpec::new(10.0)).unwrap();

    frame.fire(&0.25);
    frame.fire(&0.25);

    assert_eq!(scheduler.state("t").unwrap().elapsed, 0.5);
}

/// Re-attaching replaces the previous tick subscription.
#[test]
fn reattach_replaces_subscription() {
    let old = Signal::<f64>::new();
    let new = Signal::<f64>::new();
    let scheduler = TimerScheduler::new();
    scheduler.attach(&old).unwrap();
    scheduler.attach(&new).unwrap();

    assert_eq!(old.listener_count(), 0);
    assert_eq!(new.listener_count(), 1);
}

/// Destroy detaches from the tick source and drops every timer.
#[test]
fn destroy_detaches_and_clears() {
    let frame = Signal::<f64>::new();
    let scheduler = TimerScheduler::new();
    scheduler.attach(&frame).unwrap();
    let (fired, on_complete) = counter();
    scheduler
        .start("t", TimerSpec::new(1.0).on_complete(on_complete))
        .unwrap();

    scheduler.destroy();
    scheduler.destroy();
    frame.fire(&5.0);
    scheduler.update(5.0);

    assert!(scheduler.is_destroyed());
    assert!(!scheduler.is_attached());
    assert_eq!(frame.listener_count(), 0);
    assert!(scheduler.is_empty());
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert!(scheduler.attach(&frame).is_err());
}

/// Dropping every scheduler handle leaves the subscription inert.
#[test]
fn dropped_scheduler_stops_advancing() {
    let frame = Signal::<f64>::new();
    let (fired, on_complete) = counter();
    {
        let scheduler = TimerScheduler::new();
        scheduler.attach(&frame).unwrap();
        scheduler
            .start("t", TimerSpec::new(1.0).on_complete(on_complete))
            .unwrap();
    }

    frame.fire(&2.0);

    assert_eq!(fired.load(Ordering::SeqCst), 0);
}
