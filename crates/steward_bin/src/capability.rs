//! Host capabilities a bin depends on.
//!
//! Bins never own a clock or an entity model. Anything they need from the
//! host is injected through these narrow traits:
//!
//! - [`EndOfLife`] - one-shot "about to be removed" notifications, used by
//!   [`Bin::link_to`](crate::Bin::link_to)
//! - [`Delay`] - delayed execution without a cancellation token, used by
//!   [`Bin::destroy_after`](crate::Bin::destroy_after) and
//!   [`Bin::timeout`](crate::Bin::timeout)

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::bin::Bin;
use crate::signal::{Signal, Subscription};

/// An entity that announces its own removal exactly once.
pub trait EndOfLife {
    /// Registers `f` to run when the entity ends. The returned subscription
    /// detaches `f`; after the notification has fired it reports itself
    /// disconnected.
    fn on_end_of_life(&self, f: Box<dyn FnOnce() + Send>) -> Subscription;
}

impl EndOfLife for Signal<()> {
    fn on_end_of_life(&self, f: Box<dyn FnOnce() + Send>) -> Subscription {
        self.connect_once(move |_| f())
    }
}

/// A bin ends when it is destroyed. If it already is, `f` runs immediately.
impl EndOfLife for Bin {
    fn on_end_of_life(&self, f: Box<dyn FnOnce() + Send>) -> Subscription {
        let connected = Arc::new(AtomicBool::new(true));
        let armed = Arc::clone(&connected);
        self.on_destroy(move || {
            if armed.swap(false, Ordering::SeqCst) {
                f();
            }
        });
        Subscription::from_parts(connected, None)
    }
}

/// Schedules a callback to run once after a duration.
///
/// There is no way to retract a scheduled callback; bodies must re-check
/// whatever state they act on.
pub trait Delay: Send + Sync {
    /// Runs `f` once `after` has elapsed.
    fn schedule(&self, after: Duration, f: Box<dyn FnOnce() + Send>);
}

impl<D: Delay + ?Sized> Delay for Arc<D> {
    fn schedule(&self, after: Duration, f: Box<dyn FnOnce() + Send>) {
        (**self).schedule(after, f);
    }
}
