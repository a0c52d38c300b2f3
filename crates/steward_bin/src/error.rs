//! Error types for bins and dispatched callbacks.

/// Error returned by a fallible user callback.
pub type CallbackError = Box<dyn core::error::Error + Send + Sync>;

/// Error registering a task with a [`Bin`](crate::Bin).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BinError {
    /// The task's resource is already spent or cannot be owned by this bin.
    #[error("invalid task: {0}")]
    InvalidTask(&'static str),

    /// The bin was already destroyed; the task has been disposed immediately.
    #[error("bin is already destroyed")]
    Destroyed,
}

/// A user callback failed while running as a dispatched work item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("callback '{label}' failed: {message}")]
pub struct CallbackFailure {
    /// Label of the work item that failed.
    pub label: String,
    /// Error or panic message.
    pub message: String,
}
