//! Exactly-once resource lifecycles for frame-ticked runtimes.
//!

pub use steward_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use steward_internal::prelude::*;
}
