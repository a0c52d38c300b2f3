//! The per-frame tick source a scheduler subscribes to.

use steward_bin::{Signal, Subscription};

/// A host entity that calls its listeners once per frame with the elapsed
/// seconds since the previous frame.
pub trait TickSource {
    /// Connects `listener` to the frame tick.
    fn subscribe_ticks(&self, listener: Box<dyn Fn(f64) + Send + Sync>) -> Subscription;
}

impl TickSource for Signal<f64> {
    fn subscribe_ticks(&self, listener: Box<dyn Fn(f64) + Send + Sync>) -> Subscription {
        self.connect(move |dt| listener(*dt))
    }
}
