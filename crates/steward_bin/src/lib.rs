//! Cascading resource bins for Steward (Layer 1).
//!
//! `steward_bin` provides the ownership substrate every other Steward crate
//! builds on:
//!
//! - [`Bin`] - a scope owning disposal tasks and child scopes, torn down
//!   exactly once
//! - [`Task`] - the closed set of things a bin can own
//! - [`Signal`] / [`Subscription`] - a minimal subscribable event source
//! - [`Dispatch`] / [`WorkItem`] - isolated, fire-and-forget callback execution
//! - [`EndOfLife`] / [`Delay`] - host capabilities injected into bins
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use steward_bin::{Bin, Signal, Task};
//!
//! let released = Arc::new(AtomicUsize::new(0));
//! let player_removed = Signal::<()>::new();
//!
//! let bin = Bin::new();
//! bin.link_to(&player_removed).unwrap();
//!
//! let r = Arc::clone(&released);
//! bin.add_tagged(Task::callback(move || { r.fetch_add(1, Ordering::SeqCst); }), "ui").unwrap();
//!
//! player_removed.fire(&());
//!
//! assert!(bin.is_destroyed());
//! assert_eq!(released.load(Ordering::SeqCst), 1);
//! ```

mod bin;
mod capability;
mod dispatch;
mod error;
mod signal;
mod task;

pub use bin::{Bin, WeakBin};
pub use capability::{Delay, EndOfLife};
pub use dispatch::{Dispatch, InlineDispatch, WorkItem};
pub use error::{BinError, CallbackError, CallbackFailure};
pub use signal::{Signal, Subscription};
pub use task::{Destroyable, Task, TaskKey, safe_dispose};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{
        Bin, BinError, Delay, Destroyable, Dispatch, EndOfLife, Signal, Subscription, Task,
        TaskKey, WeakBin, safe_dispose,
    };
}
