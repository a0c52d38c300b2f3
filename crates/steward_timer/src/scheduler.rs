//! The timer registry and its per-frame advance.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use steward_bin::{Bin, BinError, Dispatch, InlineDispatch, WorkItem};

use crate::error::TimerError;
use crate::tick::TickSource;
use crate::timer::{Timer, TimerSpec, TimerState};

/// Name under which the tick subscription is stored in the scheduler's bin.
const TICK_TASK: &str = "tick";

/// Most `on_tick` calls a single timer gets from one update. Further elapsed
/// intervals are still drained from the accumulator.
const MAX_TICKS_PER_UPDATE: u64 = 64;

#[derive(Default)]
struct SchedulerState {
    timers: IndexMap<String, Timer>,
    destroyed: bool,
}

/// A registry of named, cooperatively advanced timers.
///
/// The scheduler is a clonable handle; clones share the same timers. Time
/// only moves when [`update`](Self::update) is called, either directly or by
/// the tick source the scheduler is [attached](Self::attach) to.
///
/// Completion and progress callbacks run as isolated work items after the
/// timer table has been released, so a callback may freely start, cancel or
/// pause timers on the same scheduler. A failing callback is logged and never
/// stops other timers from advancing.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use steward_bin::Signal;
/// use steward_timer::{TimerScheduler, TimerSpec};
///
/// let frame = Signal::<f64>::new();
/// let scheduler = TimerScheduler::new();
/// scheduler.attach(&frame).unwrap();
///
/// let fired = Arc::new(AtomicUsize::new(0));
/// let f = Arc::clone(&fired);
/// scheduler
///     .start("respawn", TimerSpec::new(3.0).on_complete(move || {
///         f.fetch_add(1, Ordering::SeqCst);
///     }))
///     .unwrap();
///
/// frame.fire(&1.5);
/// frame.fire(&1.5);
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// assert!(!scheduler.contains("respawn"));
/// ```
#[derive(Clone)]
pub struct TimerScheduler {
    state: Arc<Mutex<SchedulerState>>,
    bin: Bin,
    dispatcher: Arc<dyn Dispatch>,
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerScheduler {
    /// Creates an empty scheduler that runs callbacks inline.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dispatcher(Arc::new(InlineDispatch))
    }

    /// Creates an empty scheduler that hands callbacks to `dispatcher`.
    #[must_use]
    pub fn with_dispatcher(dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::default())),
            bin: Bin::with_dispatcher(Arc::clone(&dispatcher)),
            dispatcher,
        }
    }

    /// Subscribes to `source` so every frame advances the timers.
    ///
    /// The subscription is owned by the scheduler's bin. Attaching again
    /// replaces the previous subscription.
    ///
    /// # Errors
    ///
    /// - [`BinError::Destroyed`] if the scheduler has been destroyed
    /// - [`BinError::InvalidTask`] if `source` handed back a subscription
    ///   that is already disconnected
    pub fn attach(&self, source: &(impl TickSource + ?Sized)) -> Result<(), BinError> {
        if self.is_destroyed() {
            return Err(BinError::Destroyed);
        }

        let state: Weak<Mutex<SchedulerState>> = Arc::downgrade(&self.state);
        let dispatcher = Arc::clone(&self.dispatcher);
        let subscription = source.subscribe_ticks(Box::new(move |dt| {
            if let Some(state) = state.upgrade() {
                advance(&state, &*dispatcher, dt);
            }
        }));

        self.bin.add_named(TICK_TASK, subscription)?;
        tracing::debug!("timer scheduler attached to tick source");
        Ok(())
    }

    /// Returns true if the scheduler currently holds a tick subscription.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.bin.contains(TICK_TASK)
    }

    /// Starts the timer `id`, overwriting any timer already using that id.
    ///
    /// # Errors
    ///
    /// - [`TimerError::InvalidDuration`] for a negative or non-finite duration
    /// - [`TimerError::InvalidTickInterval`] for a non-positive or non-finite
    ///   tick interval
    /// - [`TimerError::Destroyed`] if the scheduler has been destroyed
    pub fn start(&self, id: impl Into<String>, spec: TimerSpec) -> Result<(), TimerError> {
        spec.validate()?;
        let id = id.into();

        let mut state = self.state.lock();
        if state.destroyed {
            return Err(TimerError::Destroyed);
        }
        if state.timers.insert(id.clone(), Timer::from(spec)).is_some() {
            tracing::warn!(timer = %id, "timer id already in use; overwriting");
        } else {
            tracing::debug!(timer = %id, "timer started");
        }
        Ok(())
    }

    /// Advances every non-paused timer by `dt` seconds.
    ///
    /// Negative or non-finite deltas are ignored. Does nothing once the
    /// scheduler is destroyed.
    pub fn update(&self, dt: f64) {
        advance(&self.state, &*self.dispatcher, dt);
    }

    /// Removes the timer `id` without running its callback.
    ///
    /// Returns false if no such timer exists.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = self.state.lock().timers.shift_remove(id).is_some();
        if removed {
            tracing::debug!(timer = %id, "timer cancelled");
        }
        removed
    }

    /// Freezes the timer `id` until [`resume`](Self::resume).
    ///
    /// Returns false if no such timer exists.
    pub fn pause(&self, id: &str) -> bool {
        self.set_paused(id, true)
    }

    /// Resumes a paused timer.
    ///
    /// Returns false if no such timer exists.
    pub fn resume(&self, id: &str) -> bool {
        self.set_paused(id, false)
    }

    fn set_paused(&self, id: &str, paused: bool) -> bool {
        match self.state.lock().timers.get_mut(id) {
            Some(timer) => {
                timer.paused = paused;
                true
            }
            None => false,
        }
    }

    /// Disconnects from the tick source and drops every timer without running
    /// its callback. Idempotent.
    pub fn destroy(&self) {
        let timers = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            std::mem::take(&mut state.timers)
        };
        tracing::debug!(dropped = timers.len(), "timer scheduler destroyed");
        drop(timers);
        self.bin.destroy();
    }

    /// Returns true once [`destroy`](Self::destroy) has run.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Returns true if a timer with this id is running or paused.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().timers.contains_key(id)
    }

    /// Number of live timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().timers.len()
    }

    /// Returns true if no timers are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().timers.is_empty()
    }

    /// Returns a snapshot of the timer `id`.
    #[must_use]
    pub fn state(&self, id: &str) -> Option<TimerState> {
        self.state.lock().timers.get(id).map(Timer::state)
    }

    /// Ids of live timers, in start order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.state.lock().timers.keys().cloned().collect()
    }
}

impl core::fmt::Debug for TimerScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TimerScheduler")
            .field("timers", &state.timers.len())
            .field("destroyed", &state.destroyed)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Advance
// ─────────────────────────────────────────────────────────────────────────────

fn advance(state: &Mutex<SchedulerState>, dispatcher: &dyn Dispatch, dt: f64) {
    if !dt.is_finite() || dt < 0.0 {
        tracing::warn!(dt, "ignoring invalid frame delta");
        return;
    }

    let mut work = Vec::new();
    {
        let mut state = state.lock();
        if state.destroyed {
            return;
        }

        let mut finished = Vec::new();
        for (id, timer) in &mut state.timers {
            if timer.paused {
                continue;
            }
            timer.elapsed += dt;
            timer.tick_accumulator += dt;

            if let Some(on_tick) = &timer.on_tick
                && timer.tick_accumulator >= timer.tick_interval
            {
                let intervals = (timer.tick_accumulator / timer.tick_interval).floor();
                timer.tick_accumulator %= timer.tick_interval;

                // Saturating float-to-int cast; huge deltas are clamped below.
                let intervals = intervals as u64;
                let calls = intervals.min(MAX_TICKS_PER_UPDATE);
                if calls < intervals {
                    tracing::warn!(
                        timer = %id,
                        intervals,
                        calls,
                        "frame delta spans too many tick intervals; coalescing progress calls"
                    );
                }

                let elapsed = timer.elapsed;
                let remaining = (timer.duration - timer.elapsed).max(0.0);
                for _ in 0..calls {
                    let on_tick = Arc::clone(on_tick);
                    work.push(WorkItem::infallible(
                        format!("timer {id} tick"),
                        move || on_tick(elapsed, remaining),
                    ));
                }
            }

            if timer.elapsed >= timer.duration {
                if let Some(callback) = &timer.callback {
                    let callback = Arc::clone(callback);
                    work.push(WorkItem::infallible(format!("timer {id}"), move || {
                        callback();
                    }));
                }
                if timer.looped {
                    timer.elapsed -= timer.duration;
                } else {
                    finished.push(id.clone());
                }
            }
        }

        for id in finished {
            state.timers.shift_remove(&id);
            tracing::debug!(timer = %id, "timer completed");
        }
    }

    for item in work {
        dispatcher.dispatch(item);
    }
}
