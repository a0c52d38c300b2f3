//! Property tests for timer advancement.
//!
//! Frame deltas are whole seconds so the arithmetic stays exact.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use steward_timer::{TimerScheduler, TimerSpec};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// A looped timer fires once per full period when no frame exceeds a period.
    #[test]
    fn prop_looped_timer_fires_once_per_period(
        duration in 1u32..8,
        frames in prop::collection::vec(0u32..8, 0..40),
    ) {
        let scheduler = TimerScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        scheduler
            .start("loop", TimerSpec::new(f64::from(duration)).looped(true).on_complete(move || {
                f.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        let mut total = 0u32;
        for dt in frames {
            let dt = dt.min(duration);
            total += dt;
            scheduler.update(f64::from(dt));
        }

        prop_assert_eq!(fired.load(Ordering::SeqCst), (total / duration) as usize);
        let state = scheduler.state("loop").unwrap();
        prop_assert_eq!(state.elapsed, f64::from(total % duration));
    }

    /// The tick accumulator always stays below the interval, and the number of
    /// progress ticks matches the whole intervals elapsed.
    #[test]
    fn prop_tick_accumulator_stays_bounded(
        interval in 1u32..4,
        frames in prop::collection::vec(0u32..10, 0..30),
    ) {
        let scheduler = TimerScheduler::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let t = Arc::clone(&ticks);
        scheduler
            .start(
                "progress",
                TimerSpec::new(1_000.0)
                    .tick_interval(f64::from(interval))
                    .on_tick(move |_, _| {
                        t.fetch_add(1, Ordering::SeqCst);
                    }),
            )
            .unwrap();

        let mut total = 0u32;
        for dt in frames {
            total += dt;
            scheduler.update(f64::from(dt));
            let state = scheduler.state("progress").unwrap();
            prop_assert!(state.tick_accumulator < state.tick_interval);
        }

        prop_assert_eq!(ticks.load(Ordering::SeqCst), (total / interval) as usize);
    }
}
