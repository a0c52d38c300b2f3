//! Error types for the timer scheduler.

/// Error starting a timer.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum TimerError {
    /// Duration was negative or not finite.
    #[error("invalid timer duration: {0}")]
    InvalidDuration(f64),

    /// Tick interval was zero, negative or not finite.
    #[error("invalid tick interval: {0}")]
    InvalidTickInterval(f64),

    /// The scheduler has been destroyed.
    #[error("timer scheduler is destroyed")]
    Destroyed,
}
