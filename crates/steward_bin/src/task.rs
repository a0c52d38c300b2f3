//! Disposal tasks: the closed set of things a bin can own.

use core::fmt;

use crate::bin::Bin;
use crate::dispatch::{Dispatch, InlineDispatch, WorkItem};
use crate::error::{BinError, CallbackError};
use crate::signal::{Subscription, disconnect_isolated};

// ─────────────────────────────────────────────────────────────────────────────
// TaskKey
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier of a task within one bin.
///
/// Generated ids and caller-chosen names share a single namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKey {
    /// Auto-incrementing id assigned by [`Bin::add`].
    Id(u64),
    /// Name chosen by the caller of [`Bin::add_named`].
    Name(String),
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<u64> for TaskKey {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for TaskKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for TaskKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&TaskKey> for TaskKey {
    fn from(key: &TaskKey) -> Self {
        key.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Destroyable
// ─────────────────────────────────────────────────────────────────────────────

/// An external resource that can be destroyed once.
///
/// Hosts implement this for renderables, instances, or any handle the bin
/// should release. `destroy` is only called while `is_alive` reports true.
pub trait Destroyable: Send + 'static {
    /// Returns false once the resource is gone for any reason.
    fn is_alive(&self) -> bool;

    /// Releases the resource.
    fn destroy(&mut self) -> Result<(), CallbackError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────────────────

type BoxedCallback = Box<dyn FnOnce() -> Result<(), CallbackError> + Send>;

/// A unit of cleanup owned by a [`Bin`].
///
/// Each variant has exactly one disposal rule:
///
/// | Variant | Disposal |
/// |---------|----------|
/// | `Callback` | invoked once |
/// | `Subscription` | disconnected if still connected |
/// | `Handle` | destroyed if still alive |
/// | `Bin` | destroyed (recursively) |
pub enum Task {
    /// One-shot cleanup closure.
    Callback(BoxedCallback),
    /// Connection to an event source.
    Subscription(Subscription),
    /// External destroyable resource.
    Handle(Box<dyn Destroyable>),
    /// Nested scope.
    Bin(Bin),
}

impl Task {
    /// Creates a callback task.
    #[must_use]
    pub fn callback(f: impl FnOnce() + Send + 'static) -> Self {
        Self::Callback(Box::new(move || {
            f();
            Ok(())
        }))
    }

    /// Creates a callback task whose failure is reported instead of ignored.
    #[must_use]
    pub fn try_callback<E>(f: impl FnOnce() -> Result<(), E> + Send + 'static) -> Self
    where
        E: Into<CallbackError>,
    {
        Self::Callback(Box::new(move || f().map_err(Into::into)))
    }

    /// Creates a handle task.
    #[must_use]
    pub fn handle(handle: impl Destroyable) -> Self {
        Self::Handle(Box::new(handle))
    }

    /// Short name of the variant, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Callback(_) => "callback",
            Self::Subscription(_) => "subscription",
            Self::Handle(_) => "handle",
            Self::Bin(_) => "bin",
        }
    }

    /// Rejects tasks whose resource is already spent.
    pub(crate) fn validate(&self) -> Result<(), BinError> {
        let reason = match self {
            Self::Subscription(sub) if !sub.is_connected() => "subscription is already disconnected",
            Self::Handle(handle) if !handle.is_alive() => "handle is no longer alive",
            Self::Bin(bin) if bin.is_destroyed() => "bin is already destroyed",
            _ => return Ok(()),
        };
        Err(BinError::InvalidTask(reason))
    }

    /// Disposes the task by its kind-specific rule.
    ///
    /// Callbacks and handle destruction are handed to `dispatcher`;
    /// subscriptions and nested bins are released before this returns.
    pub(crate) fn dispose(self, key: &TaskKey, dispatcher: &dyn Dispatch) {
        let label = format!("task {key}");
        match self {
            Self::Callback(f) => dispatcher.dispatch(WorkItem::new(label, f)),
            Self::Subscription(sub) => disconnect_isolated(label, sub),
            Self::Handle(mut handle) => dispatcher.dispatch(WorkItem::new(label, move || {
                if handle.is_alive() {
                    handle.destroy()
                } else {
                    Ok(())
                }
            })),
            Self::Bin(bin) => bin.destroy(),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscription(sub) => f.debug_tuple("Subscription").field(sub).finish(),
            Self::Bin(bin) => f.debug_tuple("Bin").field(bin).finish(),
            Self::Callback(_) | Self::Handle(_) => write!(f, "{}(..)", self.kind()),
        }
    }
}

impl From<Subscription> for Task {
    fn from(sub: Subscription) -> Self {
        Self::Subscription(sub)
    }
}

impl From<Bin> for Task {
    fn from(bin: Bin) -> Self {
        Self::Bin(bin)
    }
}

impl From<&Bin> for Task {
    fn from(bin: &Bin) -> Self {
        Self::Bin(bin.clone())
    }
}

impl From<Box<dyn Destroyable>> for Task {
    fn from(handle: Box<dyn Destroyable>) -> Self {
        Self::Handle(handle)
    }
}

/// Disposes a single task outside of any bin's bookkeeping.
///
/// Uses the same kind dispatch as [`Bin::remove`], running everything
/// inline and logging (never returning) any failure.
///
/// # Example
///
/// ```
/// use steward_bin::{Task, safe_dispose};
///
/// safe_dispose(Task::callback(|| panic!("swallowed")));
/// ```
pub fn safe_dispose(task: impl Into<Task>) {
    let task = task.into();
    let key = TaskKey::Name(format!("detached {}", task.kind()));
    task.dispose(&key, &InlineDispatch);
}
