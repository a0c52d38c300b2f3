//! Timer records and their configuration.

use std::sync::Arc;

use crate::error::TimerError;

pub(crate) type CompleteFn = Arc<dyn Fn() + Send + Sync>;
pub(crate) type TickFn = Arc<dyn Fn(f64, f64) + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// TimerSpec
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for a timer passed to
/// [`TimerScheduler::start`](crate::TimerScheduler::start).
///
/// # Example
///
/// ```
/// use steward_timer::TimerSpec;
///
/// // Fires every 10 seconds, reporting progress once per second.
/// let spec = TimerSpec::new(10.0)
///     .looped(true)
///     .on_complete(|| println!("cycle"))
///     .on_tick(|elapsed, remaining| println!("{elapsed:.1}s / {remaining:.1}s left"));
/// ```
#[derive(Clone)]
pub struct TimerSpec {
    duration: f64,
    looped: bool,
    callback: Option<CompleteFn>,
    on_tick: Option<TickFn>,
    tick_interval: f64,
}

impl TimerSpec {
    /// Creates a one-shot timer lasting `duration` seconds.
    #[must_use]
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            looped: false,
            callback: None,
            on_tick: None,
            tick_interval: 1.0,
        }
    }

    /// Restarts the timer on completion instead of removing it.
    #[must_use]
    pub fn looped(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }

    /// Sets the callback run each time the timer completes.
    #[must_use]
    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(f));
        self
    }

    /// Sets the progress callback, called with `(elapsed, remaining)` every
    /// tick interval.
    #[must_use]
    pub fn on_tick(mut self, f: impl Fn(f64, f64) + Send + Sync + 'static) -> Self {
        self.on_tick = Some(Arc::new(f));
        self
    }

    /// Sets the progress callback interval in seconds (default `1.0`).
    #[must_use]
    pub fn tick_interval(mut self, seconds: f64) -> Self {
        self.tick_interval = seconds;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), TimerError> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(TimerError::InvalidDuration(self.duration));
        }
        if !self.tick_interval.is_finite() || self.tick_interval <= 0.0 {
            return Err(TimerError::InvalidTickInterval(self.tick_interval));
        }
        Ok(())
    }
}

impl core::fmt::Debug for TimerSpec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TimerSpec")
            .field("duration", &self.duration)
            .field("looped", &self.looped)
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Timer
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable per-timer state advanced by the scheduler.
pub(crate) struct Timer {
    pub(crate) duration: f64,
    pub(crate) elapsed: f64,
    pub(crate) looped: bool,
    pub(crate) paused: bool,
    pub(crate) callback: Option<CompleteFn>,
    pub(crate) on_tick: Option<TickFn>,
    pub(crate) tick_interval: f64,
    pub(crate) tick_accumulator: f64,
}

impl From<TimerSpec> for Timer {
    fn from(spec: TimerSpec) -> Self {
        Self {
            duration: spec.duration,
            elapsed: 0.0,
            looped: spec.looped,
            paused: false,
            callback: spec.callback,
            on_tick: spec.on_tick,
            tick_interval: spec.tick_interval,
            tick_accumulator: 0.0,
        }
    }
}

impl Timer {
    pub(crate) fn state(&self) -> TimerState {
        TimerState {
            duration: self.duration,
            elapsed: self.elapsed,
            remaining: (self.duration - self.elapsed).max(0.0),
            tick_interval: self.tick_interval,
            tick_accumulator: self.tick_accumulator,
            looped: self.looped,
            paused: self.paused,
        }
    }
}

/// Read-only snapshot of a running timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerState {
    /// Total length of one cycle, in seconds.
    pub duration: f64,
    /// Time elapsed in the current cycle.
    pub elapsed: f64,
    /// `max(0, duration - elapsed)`.
    pub remaining: f64,
    /// Progress callback interval.
    pub tick_interval: f64,
    /// Time accumulated towards the next progress callback.
    pub tick_accumulator: f64,
    /// Whether the timer restarts on completion.
    pub looped: bool,
    /// Whether the timer is paused.
    pub paused: bool,
}
