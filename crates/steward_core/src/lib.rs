//! Core plugins for Steward.
//!
//! - [`TracingPlugin`] - logging via the `tracing` crate
//! - [`TimerPlugin`] - a [`TimerScheduler`](steward_timer::TimerScheduler)
//!   driven by the host frame tick
//! - [`SessionPlugin`] - the [`Sessions`] registry of per-session bins
//! - [`DefaultPlugins`] / [`MinimalPlugins`] - bundles of the above
//!
//! # Example
//!
//! ```
//! use steward_core::{DefaultPlugins, Sessions};
//! use steward_host::{Host, PluginGroup};
//!
//! let mut host = Host::new();
//! host.add_plugins(DefaultPlugins.build());
//! host.finish();
//!
//! let sessions = host.resource::<Sessions>().unwrap().clone();
//! let lobby = sessions.begin("lobby");
//!
//! host.tick(1.0 / 30.0);
//! host.shutdown();
//!
//! assert!(lobby.is_destroyed());
//! ```

mod session;
mod timer_plugin;
mod tracing_plugin;

pub use session::{SessionPlugin, Sessions};
pub use timer_plugin::TimerPlugin;
pub use tracing_plugin::{TracingConfig, TracingFormat, TracingPlugin};

use steward_host::{PluginGroup, PluginGroupBuilder};

/// Default plugins for most hosts.
///
/// Includes:
/// - [`TracingPlugin`] - logging
/// - [`TimerPlugin`] - frame-driven timers
/// - [`SessionPlugin`] - session bins
///
/// Customize with the builder:
///
/// ```ignore
/// host.add_plugins(
///     DefaultPlugins
///         .build()
///         .disable::<TracingPlugin>()
///         .add(MyLoggingPlugin),
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPlugins;

impl PluginGroup for DefaultPlugins {
    fn build(self) -> PluginGroupBuilder {
        PluginGroupBuilder::new()
            .add(TracingPlugin::default())
            .add(TimerPlugin::default())
            .add(SessionPlugin)
    }
}

/// Plugins for headless or test hosts: timers and sessions, no logging
/// subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalPlugins;

impl PluginGroup for MinimalPlugins {
    fn build(self) -> PluginGroupBuilder {
        PluginGroupBuilder::new()
            .add(TimerPlugin::default())
            .add(SessionPlugin)
    }
}

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{
        DefaultPlugins, MinimalPlugins, SessionPlugin, Sessions, TimerPlugin, TracingConfig,
        TracingFormat, TracingPlugin,
    };
}
