//! # Steward Internal Library
//!
//! Re-exports the core Steward crates for convenience.

/// Resource bins, signals and dispatch.
pub use steward_bin;

/// Tick-driven timers.
pub use steward_timer;

/// Plugin host, delay queue and runtime adapters.
pub use steward_host;

/// Tracing, timer and session plugins.
pub use steward_core;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use steward_bin::prelude::*;
    pub use steward_core::prelude::*;
    pub use steward_host::prelude::*;
    pub use steward_timer::prelude::*;
}
