//! Fire-and-forget dispatch of user callbacks.
//!
//! Every user-supplied callback (disposal actions, destroy hooks, timer
//! callbacks) runs as an independent [`WorkItem`]. A failing item, whether it
//! returns an error or panics, is reported through `tracing` and never stops
//! the sibling items queued after it.
//!
//! # Example
//!
//! ```
//! use steward_bin::{Dispatch, InlineDispatch, WorkItem};
//!
//! InlineDispatch.dispatch(WorkItem::new("greet", || {
//!     println!("hello");
//!     Ok(())
//! }));
//!
//! // A panicking item is caught and logged.
//! InlineDispatch.dispatch(WorkItem::infallible("boom", || panic!("boom")));
//! ```

use std::borrow::Cow;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::{CallbackError, CallbackFailure};

// ─────────────────────────────────────────────────────────────────────────────
// WorkItem
// ─────────────────────────────────────────────────────────────────────────────

/// A labelled, one-shot unit of work.
pub struct WorkItem {
    label: Cow<'static, str>,
    run: Box<dyn FnOnce() -> Result<(), CallbackError> + Send>,
}

impl WorkItem {
    /// Creates a work item from a fallible closure.
    #[must_use]
    pub fn new(
        label: impl Into<Cow<'static, str>>,
        run: impl FnOnce() -> Result<(), CallbackError> + Send + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            run: Box::new(run),
        }
    }

    /// Creates a work item from a closure that cannot return an error.
    #[must_use]
    pub fn infallible(
        label: impl Into<Cow<'static, str>>,
        run: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self::new(label, move || {
            run();
            Ok(())
        })
    }

    /// Returns the item's label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs the item, converting both returned errors and panics into a
    /// [`CallbackFailure`].
    pub fn run(self) -> Result<(), CallbackFailure> {
        let Self { label, run } = self;
        match catch_unwind(AssertUnwindSafe(run)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(CallbackFailure {
                label: label.into_owned(),
                message: err.to_string(),
            }),
            Err(payload) => Err(CallbackFailure {
                label: label.into_owned(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    /// Runs the item and logs a failure instead of returning it.
    pub fn run_logged(self) {
        if let Err(failure) = self.run() {
            tracing::error!(
                label = %failure.label,
                error = %failure.message,
                "callback failed"
            );
        }
    }
}

impl core::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkItem")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn core::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch
// ─────────────────────────────────────────────────────────────────────────────

/// Strategy for running work items.
///
/// Implementations must never let one item's failure affect another and
/// must not block the caller on a slow item for longer than running it
/// takes. The default [`InlineDispatch`] runs items immediately on the
/// calling thread; async hosts can spawn them instead.
pub trait Dispatch: Send + Sync + 'static {
    /// Hands a work item over for execution.
    fn dispatch(&self, item: WorkItem);
}

/// Runs work items immediately on the calling thread, isolating failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatch;

impl Dispatch for InlineDispatch {
    fn dispatch(&self, item: WorkItem) {
        item.run_logged();
    }
}
