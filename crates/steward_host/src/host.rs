//! The host runtime: plugin orchestration, frame ticks and delayed execution.
//!
//! # Lifecycle
//!
//! 1. **Dependency Resolution** - validate and topologically sort plugins
//! 2. **Build Phase** - `plugin.build()` in dependency order
//! 3. **Ready Phase** - `plugin.ready()` in dependency order
//! 4. **Tick Loop** - [`Host::tick`] runs due delayed executions, then fires
//!    the frame signal
//! 5. **Shutdown** - `plugin.cleanup()` in reverse order, then the root bin
//!    is destroyed

use core::any::{Any, TypeId};
use std::time::Duration;

use hashbrown::{HashMap, HashSet};
use steward_bin::{Bin, Signal};

use crate::delay::DelayQueue;
use crate::plugin::{Plugin, PluginId, Plugins};

type BoxedResource = Box<dyn Any + Send + Sync>;

/// Progresses linearly: `NotStarted` → `Building` → `Built` → `ShutDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum HostState {
    #[default]
    NotStarted,
    Building,
    Built,
    ShutDown,
}

struct PluginEntry {
    plugin: Box<dyn Plugin>,
    name: String,
}

/// Orchestrates plugins and owns the per-frame services they share.
///
/// A host owns:
///
/// - a frame [`Signal<f64>`] fired once per [`tick`](Self::tick) with the
///   frame delta in seconds
/// - a [`DelayQueue`] advanced by host time before each frame fires
/// - a root [`Bin`] destroyed on [`shutdown`](Self::shutdown)
/// - a type-keyed resource map plugins use to share state
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use steward_host::Host;
///
/// let mut host = Host::new();
/// host.finish();
///
/// let frames = Arc::new(AtomicUsize::new(0));
/// let f = Arc::clone(&frames);
/// let subscription = host.frame().connect(move |_dt| {
///     f.fetch_add(1, Ordering::SeqCst);
/// });
/// host.bin().add(subscription).unwrap();
///
/// host.tick(1.0 / 60.0);
/// host.tick(1.0 / 60.0);
/// host.shutdown();
/// host.tick(1.0 / 60.0);
///
/// assert_eq!(frames.load(Ordering::SeqCst), 2);
/// ```
pub struct Host {
    resources: HashMap<TypeId, BoxedResource>,
    pending_plugins: Vec<PluginEntry>,
    built_plugins: Vec<PluginEntry>,
    plugin_ids: HashSet<PluginId>,
    state: HostState,
    frame: Signal<f64>,
    delay: DelayQueue,
    bin: Bin,
    elapsed: f64,
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl Host {
    /// Creates a host with no plugins and no resources.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resources: HashMap::new(),
            pending_plugins: Vec::new(),
            built_plugins: Vec::new(),
            plugin_ids: HashSet::new(),
            state: HostState::NotStarted,
            frame: Signal::new(),
            delay: DelayQueue::new(),
            bin: Bin::new(),
            elapsed: 0.0,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Plugin Management
    // ─────────────────────────────────────────────────────────────────────────

    /// Adds a plugin or a [`PluginGroupBuilder`](crate::PluginGroupBuilder).
    ///
    /// # Panics
    ///
    /// Panics if a unique plugin is added twice.
    pub fn add_plugins<P: Plugins>(&mut self, plugins: P) -> &mut Self {
        plugins.add_to_host(self);
        self
    }

    pub(crate) fn add_plugin_boxed(&mut self, id: PluginId, plugin: Box<dyn Plugin>) {
        let name = plugin.name().to_string();

        if plugin.is_unique() && self.plugin_ids.contains(&id) {
            panic!(
                "Plugin '{}' is unique and was already added.\n\
                 If you intended to add this plugin multiple times, \
                 set `is_unique()` to return `false`.",
                name
            );
        }
        self.plugin_ids.insert(id);

        let entry = PluginEntry { plugin, name };
        if self.state == HostState::Building {
            // Added from another plugin's build: build immediately.
            entry.plugin.build(self);
            self.built_plugins.push(entry);
        } else {
            self.pending_plugins.push(entry);
        }
    }

    /// Returns true if a plugin of type `P` has been added.
    #[must_use]
    pub fn has_plugin<P: Plugin>(&self) -> bool {
        self.plugin_ids.contains(&PluginId::of::<P>())
    }

    /// Returns true once [`finish`](Self::finish) has completed.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.state == HostState::Built
    }

    /// Returns true once [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.state == HostState::ShutDown
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resources
    // ─────────────────────────────────────────────────────────────────────────

    /// Inserts a resource, returning the previous value of the same type.
    pub fn insert_resource<R: Send + Sync + 'static>(&mut self, resource: R) -> Option<R> {
        self.resources
            .insert(TypeId::of::<R>(), Box::new(resource))
            .and_then(|old| old.downcast::<R>().ok())
            .map(|old| *old)
    }

    /// Returns true if a resource of type `R` exists.
    #[must_use]
    pub fn contains_resource<R: Send + Sync + 'static>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<R>())
    }

    /// Borrows a resource.
    #[must_use]
    pub fn resource<R: Send + Sync + 'static>(&self) -> Option<&R> {
        self.resources
            .get(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast_ref::<R>())
    }

    /// Mutably borrows a resource.
    #[must_use]
    pub fn resource_mut<R: Send + Sync + 'static>(&mut self) -> Option<&mut R> {
        self.resources
            .get_mut(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast_mut::<R>())
    }

    /// Removes a resource and returns it.
    pub fn remove_resource<R: Send + Sync + 'static>(&mut self) -> Option<R> {
        self.resources
            .remove(&TypeId::of::<R>())
            .and_then(|boxed| boxed.downcast::<R>().ok())
            .map(|boxed| *boxed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shared Services
    // ─────────────────────────────────────────────────────────────────────────

    /// The frame signal, fired with the frame delta in seconds.
    #[must_use]
    pub fn frame(&self) -> &Signal<f64> {
        &self.frame
    }

    /// The host's delayed-execution queue.
    #[must_use]
    pub fn delay(&self) -> &DelayQueue {
        &self.delay
    }

    /// The root bin, destroyed on shutdown.
    #[must_use]
    pub fn bin(&self) -> &Bin {
        &self.bin
    }

    /// Total host time in seconds.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tick
    // ─────────────────────────────────────────────────────────────────────────

    /// Advances host time by `dt` seconds.
    ///
    /// Runs every delayed execution now due, then fires the frame signal.
    /// Negative or non-finite deltas are ignored. Does nothing after
    /// shutdown.
    pub fn tick(&mut self, dt: f64) {
        if self.state == HostState::ShutDown {
            return;
        }
        let Ok(step) = Duration::try_from_secs_f64(dt) else {
            tracing::warn!(dt, "ignoring invalid frame delta");
            return;
        };

        self.elapsed += dt;
        self.delay.advance(step);
        self.frame.fire(&dt);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Builds every plugin, then readies them, in dependency order.
    ///
    /// # Panics
    ///
    /// - If a plugin's dependency was never added
    /// - If plugins depend on each other circularly
    /// - If called more than once
    pub fn finish(&mut self) {
        if self.state != HostState::NotStarted {
            panic!("Host::finish() was already called. Cannot build twice.");
        }

        let sorted = self.sort_plugins_by_dependencies();

        self.state = HostState::Building;
        for entry in sorted {
            tracing::debug!(plugin = %entry.name, "building plugin");
            entry.plugin.build(self);
            self.built_plugins.push(entry);
        }

        // Plugins added during ready() are built in place and appended.
        let mut plugins = core::mem::take(&mut self.built_plugins);
        for entry in &plugins {
            entry.plugin.ready(self);
        }
        plugins.append(&mut self.built_plugins);
        self.built_plugins = plugins;

        self.state = HostState::Built;
        tracing::debug!(plugins = self.built_plugins.len(), "host ready");
    }

    /// Cleans plugins up in reverse dependency order, then destroys the root
    /// bin. Idempotent.
    pub fn shutdown(&mut self) {
        if self.state == HostState::ShutDown {
            return;
        }

        let plugins = core::mem::take(&mut self.built_plugins);
        for entry in plugins.iter().rev() {
            tracing::debug!(plugin = %entry.name, "cleaning up plugin");
            entry.plugin.cleanup(self);
        }
        self.built_plugins = plugins;

        self.state = HostState::ShutDown;
        self.bin.destroy();
        tracing::debug!("host shut down");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal: Dependency Resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// Kahn's algorithm over pending plugins.
    ///
    /// # Panics
    ///
    /// - If a plugin's dependency is not found
    /// - If there is a circular dependency
    fn sort_plugins_by_dependencies(&mut self) -> Vec<PluginEntry> {
        let pending = core::mem::take(&mut self.pending_plugins);
        let n = pending.len();

        let mut name_to_index: HashMap<&str, usize> = HashMap::new();
        for (i, entry) in pending.iter().enumerate() {
            name_to_index.insert(entry.name.as_str(), i);
        }

        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, entry) in pending.iter().enumerate() {
            for dep in entry.plugin.dependencies() {
                let Some(&dep_idx) = name_to_index.get(dep.type_name()) else {
                    panic!(
                        "Plugin '{}' requires '{}' which was not added.\n\
                         Add {} before {}, or use a plugin group that includes it.",
                        entry.name,
                        dep.type_name(),
                        dep.type_name(),
                        entry.name
                    );
                };
                dependents[dep_idx].push(i);
                in_degree[i] += 1;
            }
        }

        // Reversed so ties pop in insertion order.
        let mut queue: Vec<usize> = (0..n).rev().filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(idx) = queue.pop() {
            order.push(idx);
            for &dependent in dependents[idx].iter().rev() {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push(dependent);
                }
            }
        }

        if order.len() != n {
            let in_cycle: Vec<&str> = (0..n)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| pending[i].name.as_str())
                .collect();
            panic!(
                "Circular dependency detected among plugins: {:?}\n\
                 Break the cycle by extracting shared functionality into a separate plugin.",
                in_cycle
            );
        }

        drop(name_to_index);
        let mut slots: Vec<Option<PluginEntry>> = pending.into_iter().map(Some).collect();
        order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect()
    }
}

impl core::fmt::Debug for Host {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Host")
            .field("state", &self.state)
            .field("plugins", &self.built_plugins.len())
            .field("resources", &self.resources.len())
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}
