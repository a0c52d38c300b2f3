//! Plugin host for Steward.
//!
//! A [`Host`] is a plugin orchestrator that also owns the per-frame services
//! resource bins and timers depend on:
//!
//! - the frame tick, a [`Signal<f64>`](steward_bin::Signal) usable as a
//!   tick source
//! - the [`DelayQueue`], a deterministic [`Delay`](steward_bin::Delay)
//!   advanced by host time
//! - a root [`Bin`](steward_bin::Bin) torn down on shutdown
//!
//! For hosts driven by a tokio runtime, [`TokioDelay`] and [`TokioDispatch`]
//! adapt the same capabilities to real time and spawned tasks.

mod delay;
mod host;
pub mod plugin;
mod runtime;

pub use delay::DelayQueue;
pub use host::Host;
pub use plugin::{Plugin, PluginGroup, PluginGroupBuilder, PluginId, Plugins};
pub use runtime::{TokioDelay, TokioDispatch};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{
        DelayQueue, Host, Plugin, PluginGroup, PluginGroupBuilder, PluginId, Plugins,
    };
}
