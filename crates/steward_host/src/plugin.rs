//! Plugins: the unit of composition for a [`Host`].
//!
//! Everything a host does beyond ticking and delaying comes from plugins.
//! A plugin installs resources in [`build`](Plugin::build), wires itself to
//! other plugins in [`ready`](Plugin::ready), and releases what it owns in
//! [`cleanup`](Plugin::cleanup).
//!
//! # Example
//!
//! ```
//! use steward_host::{Host, Plugin, PluginId};
//!
//! struct ScorePlugin;
//!
//! struct Score(u32);
//!
//! impl Plugin for ScorePlugin {
//!     fn build(&self, host: &mut Host) {
//!         host.insert_resource(Score(0));
//!     }
//! }
//!
//! struct BonusPlugin;
//!
//! impl Plugin for BonusPlugin {
//!     fn build(&self, host: &mut Host) {
//!         if let Some(score) = host.resource_mut::<Score>() {
//!             score.0 += 10;
//!         }
//!     }
//!
//!     fn dependencies(&self) -> Vec<PluginId> {
//!         vec![PluginId::of::<ScorePlugin>()]
//!     }
//! }
//!
//! let mut host = Host::new();
//! host.add_plugins(BonusPlugin).add_plugins(ScorePlugin);
//! host.finish();
//! assert_eq!(host.resource::<Score>().map(|s| s.0), Some(10));
//! ```

use core::any::TypeId;

use crate::host::Host;

// ─────────────────────────────────────────────────────────────────────────────
// PluginId
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for a plugin type.
///
/// Used for dependency resolution and duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginId {
    type_id: TypeId,
    type_name: &'static str,
}

impl PluginId {
    /// Creates a `PluginId` for the given plugin type.
    #[must_use]
    pub fn of<P: Plugin>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            type_name: core::any::type_name::<P>(),
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A bundle of resources and wiring that extends a [`Host`].
///
/// Lifecycle, driven by the host:
///
/// 1. **Build** - `build()` in dependency order, during [`Host::finish`]
/// 2. **Ready** - `ready()` in dependency order, once everything is built
/// 3. **Cleanup** - `cleanup()` in reverse order, during [`Host::shutdown`]
pub trait Plugin: Send + Sync + 'static {
    /// Installs resources. Called once, in dependency order.
    fn build(&self, host: &mut Host);

    /// Called after every plugin has been built.
    ///
    /// Use this for work that needs resources installed by other plugins.
    fn ready(&self, _host: &mut Host) {}

    /// Called when the host shuts down, dependents before dependencies.
    fn cleanup(&self, _host: &mut Host) {}

    /// Returns the plugin's name for diagnostics. Defaults to the type name.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Plugins that must be built before this one.
    ///
    /// [`Host::finish`] panics if one of them was never added.
    fn dependencies(&self) -> Vec<PluginId> {
        Vec::new()
    }

    /// Returns true if this plugin can only be added once (the default).
    fn is_unique(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugins Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Anything [`Host::add_plugins`] accepts: a single [`Plugin`] or a
/// [`PluginGroupBuilder`].
pub trait Plugins {
    /// Adds these plugins to the host.
    fn add_to_host(self, host: &mut Host);
}

impl<P: Plugin> Plugins for P {
    fn add_to_host(self, host: &mut Host) {
        host.add_plugin_boxed(PluginId::of::<P>(), Box::new(self));
    }
}

impl Plugins for PluginGroupBuilder {
    fn add_to_host(self, host: &mut Host) {
        for boxed in self.plugins {
            host.add_plugin_boxed(boxed.id, boxed.plugin);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PluginGroup
// ─────────────────────────────────────────────────────────────────────────────

/// A named bundle of plugins that callers may customize before adding.
pub trait PluginGroup {
    /// Returns the plugins in this group.
    fn build(self) -> PluginGroupBuilder;
}

pub(crate) struct BoxedPlugin {
    pub(crate) id: PluginId,
    pub(crate) plugin: Box<dyn Plugin>,
}

/// Builder for customizing plugin groups.
///
/// ```ignore
/// DefaultPlugins
///     .build()
///     .disable::<TracingPlugin>()
///     .add(MyTracingPlugin::new())
/// ```
#[derive(Default)]
pub struct PluginGroupBuilder {
    plugins: Vec<BoxedPlugin>,
}

impl PluginGroupBuilder {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plugin.
    #[must_use]
    #[expect(
        clippy::should_implement_trait,
        reason = "This is a builder method, not std::ops::Add"
    )]
    pub fn add<P: Plugin>(mut self, plugin: P) -> Self {
        self.plugins.push(boxed(plugin));
        self
    }

    /// Inserts a plugin before `Target`, or at the front if `Target` is absent.
    #[must_use]
    pub fn add_before<P: Plugin, Target: Plugin>(mut self, plugin: P) -> Self {
        let position = self.position_of::<Target>().unwrap_or(0);
        self.plugins.insert(position, boxed(plugin));
        self
    }

    /// Inserts a plugin after `Target`, or at the end if `Target` is absent.
    #[must_use]
    pub fn add_after<P: Plugin, Target: Plugin>(mut self, plugin: P) -> Self {
        let position = self
            .position_of::<Target>()
            .map_or(self.plugins.len(), |i| i + 1);
        self.plugins.insert(position, boxed(plugin));
        self
    }

    /// Removes every plugin of type `P`. No-op if absent.
    #[must_use]
    pub fn disable<P: Plugin>(mut self) -> Self {
        let id = PluginId::of::<P>();
        self.plugins.retain(|p| p.id != id);
        self
    }

    /// Returns true if the group contains a plugin of type `P`.
    #[must_use]
    pub fn contains<P: Plugin>(&self) -> bool {
        self.position_of::<P>().is_some()
    }

    /// Number of plugins in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true if the group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn position_of<P: Plugin>(&self) -> Option<usize> {
        let id = PluginId::of::<P>();
        self.plugins.iter().position(|p| p.id == id)
    }
}

fn boxed<P: Plugin>(plugin: P) -> BoxedPlugin {
    BoxedPlugin {
        id: PluginId::of::<P>(),
        plugin: Box::new(plugin),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PluginA;
    impl Plugin for PluginA {
        fn build(&self, _host: &mut Host) {}
    }

    struct PluginB;
    impl Plugin for PluginB {
        fn build(&self, _host: &mut Host) {}
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<PluginA>()]
        }
    }

    struct PluginC;
    impl Plugin for PluginC {
        fn build(&self, _host: &mut Host) {}
    }

    fn names(builder: &PluginGroupBuilder) -> Vec<&'static str> {
        builder.plugins.iter().map(|p| p.id.type_name()).collect()
    }

    #[test]
    fn plugin_id_equality() {
        assert_eq!(PluginId::of::<PluginA>(), PluginId::of::<PluginA>());
        assert_ne!(PluginId::of::<PluginA>(), PluginId::of::<PluginB>());
        assert_eq!(PluginId::of::<PluginA>().type_id(), TypeId::of::<PluginA>());
    }

    #[test]
    fn plugin_defaults() {
        assert!(PluginA.name().contains("PluginA"));
        assert!(PluginA.is_unique());
        assert!(PluginA.dependencies().is_empty());
        assert_eq!(PluginB.dependencies(), vec![PluginId::of::<PluginA>()]);
    }

    #[test]
    fn group_add_before_and_after() {
        let builder = PluginGroupBuilder::new()
            .add(PluginA)
            .add(PluginB)
            .add_before::<_, PluginB>(PluginC);
        assert_eq!(names(&builder), vec![
            core::any::type_name::<PluginA>(),
            core::any::type_name::<PluginC>(),
            core::any::type_name::<PluginB>(),
        ]);

        let builder = PluginGroupBuilder::new()
            .add(PluginA)
            .add_after::<_, PluginB>(PluginC);
        assert_eq!(names(&builder), vec![
            core::any::type_name::<PluginA>(),
            core::any::type_name::<PluginC>(),
        ]);
    }

    #[test]
    fn group_add_before_missing_target_goes_first() {
        let builder = PluginGroupBuilder::new()
            .add(PluginA)
            .add_before::<_, PluginB>(PluginC);
        assert!(builder.plugins[0].id == PluginId::of::<PluginC>());
    }

    #[test]
    fn group_disable() {
        let builder = PluginGroupBuilder::new()
            .add(PluginA)
            .add(PluginB)
            .disable::<PluginA>()
            .disable::<PluginC>();

        assert_eq!(builder.len(), 1);
        assert!(builder.contains::<PluginB>());
        assert!(!builder.contains::<PluginA>());
        assert!(PluginGroupBuilder::new().is_empty());
    }
}
