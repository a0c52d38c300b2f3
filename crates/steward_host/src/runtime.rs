//! Adapters running bin and timer work on a tokio runtime.

use std::time::Duration;

use steward_bin::{Delay, Dispatch, WorkItem};
use tokio::runtime::Handle;

/// A [`Delay`] backed by `tokio::time::sleep`.
///
/// Each scheduled execution is a spawned task on the wrapped runtime. There
/// is no cancellation; callers re-check their own state when the body runs.
#[derive(Debug, Clone)]
pub struct TokioDelay {
    handle: Handle,
}

impl TokioDelay {
    /// Wraps an explicit runtime handle.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Wraps the runtime of the calling context, if there is one.
    #[must_use]
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Delay for TokioDelay {
    fn schedule(&self, after: Duration, f: Box<dyn FnOnce() + Send>) {
        self.handle.spawn(async move {
            tokio::time::sleep(after).await;
            WorkItem::infallible("delayed execution", f).run_logged();
        });
    }
}

/// A [`Dispatch`] that runs every work item as its own tokio task.
///
/// Work items are fire-and-forget: the caller never waits for them, and a
/// failing item is logged from inside its task.
#[derive(Debug, Clone)]
pub struct TokioDispatch {
    handle: Handle,
}

impl TokioDispatch {
    /// Wraps an explicit runtime handle.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Wraps the runtime of the calling context, if there is one.
    #[must_use]
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Dispatch for TokioDispatch {
    fn dispatch(&self, item: WorkItem) {
        tracing::trace!(label = item.label(), "spawning work item");
        self.handle.spawn(async move { item.run_logged() });
    }
}
