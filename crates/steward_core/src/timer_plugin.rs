//! Installs a [`TimerScheduler`] driven by the host's frame tick.

use std::sync::Arc;

use steward_bin::Dispatch;
use steward_host::{Host, Plugin};
use steward_timer::TimerScheduler;

/// Inserts a [`TimerScheduler`] resource attached to [`Host::frame`].
///
/// The scheduler advances on every [`Host::tick`] and is destroyed, which
/// detaches it from the frame signal, when the host shuts down.
///
/// # Resources Provided
///
/// | Resource | Description |
/// |----------|-------------|
/// | [`TimerScheduler`] | Shared timer registry handle |
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use steward_core::TimerPlugin;
/// use steward_host::Host;
/// use steward_timer::{TimerScheduler, TimerSpec};
///
/// let mut host = Host::new();
/// host.add_plugins(TimerPlugin::default());
/// host.finish();
///
/// let done = Arc::new(AtomicBool::new(false));
/// let d = Arc::clone(&done);
/// let timers = host.resource::<TimerScheduler>().unwrap().clone();
/// timers
///     .start("intro", TimerSpec::new(1.0).on_complete(move || d.store(true, Ordering::SeqCst)))
///     .unwrap();
///
/// host.tick(0.5);
/// host.tick(0.5);
/// assert!(done.load(Ordering::SeqCst));
/// ```
#[derive(Default)]
pub struct TimerPlugin {
    dispatcher: Option<Arc<dyn Dispatch>>,
}

impl TimerPlugin {
    /// Creates a plugin whose scheduler runs callbacks inline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs timer callbacks through `dispatcher` instead.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatch>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }
}

impl Plugin for TimerPlugin {
    fn build(&self, host: &mut Host) {
        let scheduler = match &self.dispatcher {
            Some(dispatcher) => TimerScheduler::with_dispatcher(Arc::clone(dispatcher)),
            None => TimerScheduler::new(),
        };
        if let Err(err) = scheduler.attach(host.frame()) {
            tracing::error!(error = %err, "failed to attach timer scheduler to the frame tick");
        }
        if host.insert_resource(scheduler).is_some() {
            tracing::warn!("replaced an existing timer scheduler resource");
        }
    }

    fn cleanup(&self, host: &mut Host) {
        if let Some(scheduler) = host.resource::<TimerScheduler>() {
            tracing::debug!(timers = scheduler.len(), "destroying timer scheduler");
            scheduler.destroy();
        }
    }
}

impl core::fmt::Debug for TimerPlugin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TimerPlugin")
            .field("custom_dispatcher", &self.dispatcher.is_some())
            .finish()
    }
}
