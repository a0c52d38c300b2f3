//! Cooperative tick-driven timers for Steward.
//!
//! A [`TimerScheduler`] keeps a table of named timers and advances them by
//! the frame delta it receives, either from [`TimerScheduler::update`] or from
//! a [`TickSource`] it is attached to. The tick subscription lives in a
//! [`Bin`](steward_bin::Bin) owned by the scheduler, so destroying the
//! scheduler always detaches it.
//!
//! # Example
//!
//! ```
//! use steward_timer::{TimerScheduler, TimerSpec};
//!
//! let scheduler = TimerScheduler::new();
//! scheduler
//!     .start("buff", TimerSpec::new(5.0).looped(true).tick_interval(0.5))
//!     .unwrap();
//!
//! scheduler.update(6.0);
//!
//! let state = scheduler.state("buff").unwrap();
//! assert_eq!(state.elapsed, 1.0);
//! ```

mod error;
mod scheduler;
mod tick;
mod timer;

pub use error::TimerError;
pub use scheduler::TimerScheduler;
pub use tick::TickSource;
pub use timer::{TimerSpec, TimerState};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{TickSource, TimerError, TimerScheduler, TimerSpec, TimerState};
}
