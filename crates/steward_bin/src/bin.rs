//! The resource bin: a scope that owns disposal tasks and child scopes.
//!
//! A [`Bin`] owns any number of [`Task`]s. Destroying the bin disposes every
//! task exactly once, cascading into nested bins, and then runs its
//! `on_destroy` hooks. Destruction is idempotent, so a child registered in
//! a parent can be destroyed directly or by the parent's cascade without
//! any duplicate work.
//!
//! # Example
//!
//! ```
//! use steward_bin::{Bin, Task};
//!
//! let session = Bin::new();
//! let hud = session.child().unwrap();
//!
//! hud.add(Task::callback(|| println!("hud released"))).unwrap();
//! session.add_named("music", Task::callback(|| println!("music stopped"))).unwrap();
//!
//! session.destroy();
//! assert!(hud.is_destroyed());
//!
//! // Destroying again is a no-op.
//! hud.destroy();
//! ```
//!
//! # Handles
//!
//! `Bin` is a cheap, clonable handle. All clones refer to the same scope.
//! When the last handle is dropped, a bin that was never destroyed is torn
//! down as if [`Bin::destroy`] had been called.

use core::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::capability::{Delay, EndOfLife};
use crate::dispatch::{Dispatch, InlineDispatch, WorkItem};
use crate::error::{BinError, CallbackError};
use crate::signal::Subscription;
use crate::task::{Task, TaskKey};

type Hook = Box<dyn FnOnce() -> Result<(), CallbackError> + Send>;

/// Current location of a pending timeout task.
///
/// Written under the owning bin's lock on every registration, so a timeout
/// moved by [`Bin::extend`] still finds and removes its own entry.
pub(crate) struct TaskOwner {
    bin: WeakBin,
    key: TaskKey,
}

pub(crate) type OwnerSlot = Arc<Mutex<TaskOwner>>;

// ─────────────────────────────────────────────────────────────────────────────
// Internal state
// ─────────────────────────────────────────────────────────────────────────────

struct BinState {
    /// Owned tasks, in registration order.
    tasks: IndexMap<TaskKey, Task>,
    /// Tag index over `tasks`. May hold keys whose task is already gone.
    tags: HashMap<String, HashSet<TaskKey>>,
    /// Hooks run after all tasks are disposed.
    hooks: Vec<Hook>,
    next_id: u64,
    destroyed: bool,
}

struct BinInner {
    state: Mutex<BinState>,
    dispatcher: Arc<dyn Dispatch>,
}

impl BinInner {
    fn teardown(&self) {
        let (tasks, hooks) = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            // Set before disposing anything so re-entrant destroys are no-ops.
            state.destroyed = true;
            state.tags.clear();
            (mem::take(&mut state.tasks), mem::take(&mut state.hooks))
        };

        tracing::debug!(tasks = tasks.len(), hooks = hooks.len(), "destroying bin");

        for (key, task) in tasks {
            task.dispose(&key, &*self.dispatcher);
        }
        for hook in hooks {
            self.dispatcher.dispatch(WorkItem::new("on_destroy", hook));
        }
    }
}

impl Drop for BinInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.destroyed && (!state.tasks.is_empty() || !state.hooks.is_empty()) {
            tracing::debug!(
                tasks = state.tasks.len(),
                "last handle to a live bin dropped; destroying it"
            );
            self.teardown();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bin
// ─────────────────────────────────────────────────────────────────────────────

/// A disposable scope with exactly-once, cascading teardown.
///
/// # Failure Handling
///
/// Disposal callbacks, handle destruction and `on_destroy` hooks run as
/// isolated work items through the bin's [`Dispatch`]. A failing item is
/// logged and never stops sibling disposal.
#[derive(Clone)]
pub struct Bin {
    inner: Arc<BinInner>,
}

impl Default for Bin {
    fn default() -> Self {
        Self::new()
    }
}

impl Bin {
    /// Creates an empty bin that runs callbacks inline.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dispatcher(Arc::new(InlineDispatch))
    }

    /// Creates an empty bin that hands callbacks to `dispatcher`.
    #[must_use]
    pub fn with_dispatcher(dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            inner: Arc::new(BinInner {
                state: Mutex::new(BinState {
                    tasks: IndexMap::new(),
                    tags: HashMap::new(),
                    hooks: Vec::new(),
                    next_id: 0,
                    destroyed: false,
                }),
                dispatcher,
            }),
        }
    }

    /// Returns the dispatcher this bin runs callbacks with.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<dyn Dispatch> {
        &self.inner.dispatcher
    }

    /// Creates a new bin sharing this bin's dispatcher and registers it as
    /// a task, so destroying `self` destroys the child.
    ///
    /// # Errors
    ///
    /// Returns [`BinError::Destroyed`] if `self` is already destroyed.
    pub fn child(&self) -> Result<Bin, BinError> {
        let child = Self::with_dispatcher(Arc::clone(&self.inner.dispatcher));
        self.add(&child)?;
        Ok(child)
    }

    /// Returns a non-owning handle to this bin.
    #[must_use]
    pub fn downgrade(&self) -> WeakBin {
        WeakBin {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns true if both handles refer to the same bin.
    #[must_use]
    pub fn ptr_eq(&self, other: &Bin) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Takes ownership of `task` under a freshly generated id.
    ///
    /// # Errors
    ///
    /// - [`BinError::InvalidTask`] if the task's resource is already spent,
    ///   or the task is this bin or a bin that already owns it, directly or
    ///   through nested bins
    /// - [`BinError::Destroyed`] if the bin is destroyed; the task has then
    ///   been disposed immediately
    pub fn add(&self, task: impl Into<Task>) -> Result<TaskKey, BinError> {
        self.insert(None, task.into(), Vec::new())
    }

    /// Like [`add`](Self::add), also indexing the task under `tag`.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn add_tagged(
        &self,
        task: impl Into<Task>,
        tag: impl Into<String>,
    ) -> Result<TaskKey, BinError> {
        self.insert(None, task.into(), vec![tag.into()])
    }

    /// Takes ownership of `task` under `name`.
    ///
    /// A task already registered under `name` is disposed first, before the
    /// new task becomes reachable. Use this for "only one of this kind"
    /// registrations.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn add_named(
        &self,
        name: impl Into<String>,
        task: impl Into<Task>,
    ) -> Result<TaskKey, BinError> {
        self.insert(Some(name.into()), task.into(), Vec::new())
    }

    /// Like [`add_named`](Self::add_named), also indexing the task under `tag`.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn add_named_tagged(
        &self,
        name: impl Into<String>,
        task: impl Into<Task>,
        tag: impl Into<String>,
    ) -> Result<TaskKey, BinError> {
        self.insert(Some(name.into()), task.into(), vec![tag.into()])
    }

    fn insert(
        &self,
        name: Option<String>,
        task: Task,
        tags: Vec<String>,
    ) -> Result<TaskKey, BinError> {
        if let Task::Bin(bin) = &task {
            if bin.ptr_eq(self) {
                return Err(BinError::InvalidTask("a bin cannot own itself"));
            }
            if bin.owns(self) {
                return Err(BinError::InvalidTask("a bin cannot own one of its owners"));
            }
        }
        task.validate()?;
        let owner = match &task {
            Task::Subscription(sub) => sub.owner().cloned(),
            _ => None,
        };

        if let Some(name) = &name {
            let key = TaskKey::Name(name.clone());
            let prior = self.inner.state.lock().tasks.shift_remove(&key);
            if let Some(prior) = prior {
                tracing::warn!(key = %key, "task name already in use; disposing the previous task");
                prior.dispose(&key, &*self.inner.dispatcher);
            }
        }

        let mut state = self.inner.state.lock();
        if state.destroyed {
            drop(state);
            tracing::warn!(
                kind = task.kind(),
                "task added to a destroyed bin; disposing it immediately"
            );
            let key = name.map_or(TaskKey::Id(u64::MAX), TaskKey::Name);
            task.dispose(&key, &*self.inner.dispatcher);
            return Err(BinError::Destroyed);
        }

        let key = match name {
            Some(name) => {
                let key = TaskKey::Name(name);
                // A reused name never inherits the previous task's tags.
                for keys in state.tags.values_mut() {
                    keys.remove(&key);
                }
                key
            }
            None => {
                let id = state.next_id;
                state.next_id += 1;
                TaskKey::Id(id)
            }
        };

        if let Some(owner) = &owner {
            *owner.lock() = TaskOwner {
                bin: self.downgrade(),
                key: key.clone(),
            };
        }
        let displaced = state.tasks.insert(key.clone(), task);
        for tag in tags {
            state.tags.entry(tag).or_default().insert(key.clone());
        }
        drop(state);

        // Only reachable if the previous task's disposal re-registered the name.
        if let Some(displaced) = displaced {
            tracing::warn!(key = %key, "task name re-registered during replacement");
            displaced.dispose(&key, &*self.inner.dispatcher);
        }

        Ok(key)
    }

    /// Returns true if `other` is reachable through this bin's nested bins.
    fn owns(&self, other: &Bin) -> bool {
        let mut visited: Vec<Bin> = Vec::new();
        let mut pending = vec![self.clone()];
        while let Some(bin) = pending.pop() {
            if visited.iter().any(|seen| seen.ptr_eq(&bin)) {
                continue;
            }
            let children: Vec<Bin> = bin
                .inner
                .state
                .lock()
                .tasks
                .values()
                .filter_map(|task| match task {
                    Task::Bin(child) => Some(child.clone()),
                    _ => None,
                })
                .collect();
            if children.iter().any(|child| child.ptr_eq(other)) {
                return true;
            }
            visited.push(bin);
            pending.extend(children);
        }
        false
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Removal
    // ─────────────────────────────────────────────────────────────────────────

    /// Disposes the task registered under `key`.
    ///
    /// Returns false if no such task exists. Tag entries pointing at the
    /// removed task are pruned lazily.
    pub fn remove(&self, key: impl Into<TaskKey>) -> bool {
        let key = key.into();
        let task = self.inner.state.lock().tasks.shift_remove(&key);
        match task {
            Some(task) => {
                task.dispose(&key, &*self.inner.dispatcher);
                true
            }
            None => false,
        }
    }

    /// Disposes every task currently tagged with `tag` and drops the tag.
    ///
    /// Tasks are disposed in registration order. Returns the number of tasks
    /// disposed.
    pub fn remove_tagged(&self, tag: &str) -> usize {
        let tasks: Vec<(TaskKey, Task)> = {
            let mut state = self.inner.state.lock();
            let Some(keys) = state.tags.remove(tag) else {
                return 0;
            };
            let ordered: Vec<TaskKey> = state
                .tasks
                .keys()
                .filter(|key| keys.contains(*key))
                .cloned()
                .collect();
            ordered
                .into_iter()
                .filter_map(|key| state.tasks.shift_remove(&key).map(|task| (key, task)))
                .collect()
        };

        tracing::debug!(tag, count = tasks.len(), "removing tagged tasks");
        let count = tasks.len();
        for (key, task) in tasks {
            task.dispose(&key, &*self.inner.dispatcher);
        }
        count
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifetime links
    // ─────────────────────────────────────────────────────────────────────────

    /// Ties this bin's life to `entity`: when the entity ends, the bin is
    /// destroyed.
    ///
    /// The end-of-life subscription is itself a task, so destroying the bin
    /// first detaches it.
    ///
    /// # Errors
    ///
    /// Returns [`BinError::Destroyed`] if the bin is (or, because the entity
    /// had already ended, just became) destroyed.
    pub fn link_to(&self, entity: &(impl EndOfLife + ?Sized)) -> Result<TaskKey, BinError> {
        self.link(entity, Vec::new())
    }

    /// Like [`link_to`](Self::link_to), tagging the link subscription.
    ///
    /// # Errors
    ///
    /// See [`link_to`](Self::link_to).
    pub fn link_to_tagged(
        &self,
        entity: &(impl EndOfLife + ?Sized),
        tag: impl Into<String>,
    ) -> Result<TaskKey, BinError> {
        self.link(entity, vec![tag.into()])
    }

    fn link(
        &self,
        entity: &(impl EndOfLife + ?Sized),
        tags: Vec<String>,
    ) -> Result<TaskKey, BinError> {
        if self.is_destroyed() {
            return Err(BinError::Destroyed);
        }

        let weak = self.downgrade();
        let subscription = entity.on_end_of_life(Box::new(move || {
            if let Some(bin) = weak.upgrade() {
                tracing::debug!("linked entity ended; destroying bin");
                bin.destroy();
            }
        }));

        if self.is_destroyed() {
            return Err(BinError::Destroyed);
        }
        self.insert(None, Task::Subscription(subscription), tags)
    }

    /// Moves every task held by `other` into this bin, then destroys `other`.
    ///
    /// Generated ids are re-assigned in this bin's id space; names and tags
    /// are kept. Since `other` owns nothing by the time it is destroyed,
    /// only its `on_destroy` hooks run.
    pub fn extend(&self, other: &Bin) {
        if self.ptr_eq(other) {
            return;
        }

        let (tasks, tags) = {
            let mut state = other.inner.state.lock();
            (mem::take(&mut state.tasks), mem::take(&mut state.tags))
        };

        tracing::debug!(count = tasks.len(), "adopting tasks from another bin");
        for (key, task) in tasks {
            let task_tags: Vec<String> = tags
                .iter()
                .filter(|(_, keys)| keys.contains(&key))
                .map(|(tag, _)| tag.clone())
                .collect();
            let name = match key {
                TaskKey::Name(name) => Some(name),
                TaskKey::Id(_) => None,
            };
            if let Err(err) = self.insert(name, task, task_tags) {
                tracing::warn!(error = %err, "task could not be adopted");
            }
        }

        other.destroy();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Destruction
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers `f` to run once after all tasks are disposed.
    ///
    /// Hooks run in registration order, each isolated from the others'
    /// failures. On an already destroyed bin, `f` is dispatched immediately.
    pub fn on_destroy(&self, f: impl FnOnce() + Send + 'static) {
        let hook: Hook = Box::new(move || {
            f();
            Ok(())
        });

        let mut state = self.inner.state.lock();
        if state.destroyed {
            drop(state);
            self.inner
                .dispatcher
                .dispatch(WorkItem::new("on_destroy", hook));
            return;
        }
        state.hooks.push(hook);
    }

    /// Destroys the bin after `after` elapses, unless by then it holds no
    /// tasks (or is already destroyed), in which case nothing happens.
    ///
    /// The scheduled execution cannot be retracted; it only holds a weak
    /// handle and re-checks the bin's state when it runs.
    pub fn destroy_after(&self, delay: &dyn Delay, after: Duration) {
        let weak = self.downgrade();
        delay.schedule(
            after,
            Box::new(move || {
                let Some(bin) = weak.upgrade() else {
                    return;
                };
                if bin.is_destroyed() || bin.task_count() == 0 {
                    tracing::debug!("delayed destroy skipped; bin already clean");
                    return;
                }
                bin.destroy();
            }),
        );
    }

    /// Runs `f` after `after` elapses, as long as the bin is still alive.
    ///
    /// The pending timeout is a task of this bin: removing it by its key or
    /// destroying the bin cancels it. Once it has run, the task entry is
    /// gone. If the task is moved by [`extend`](Self::extend), it keeps
    /// running from its new bin under its new key.
    ///
    /// # Errors
    ///
    /// Returns [`BinError::Destroyed`] if the bin is already destroyed.
    pub fn timeout(
        &self,
        delay: &dyn Delay,
        after: Duration,
        f: impl FnOnce() + Send + 'static,
    ) -> Result<TaskKey, BinError> {
        let armed = Arc::new(AtomicBool::new(true));
        let owner: OwnerSlot = Arc::new(Mutex::new(TaskOwner {
            bin: self.downgrade(),
            key: TaskKey::Id(u64::MAX),
        }));
        let key = self.add(
            Subscription::from_parts(Arc::clone(&armed), None).with_owner(Arc::clone(&owner)),
        )?;

        delay.schedule(
            after,
            Box::new(move || {
                if !armed.swap(false, Ordering::SeqCst) {
                    return;
                }
                let (weak, entry) = {
                    let owner = owner.lock();
                    (owner.bin.clone(), owner.key.clone())
                };
                // A dropped owner has already disposed, and so disarmed, the task.
                let Some(bin) = weak.upgrade() else {
                    return;
                };
                let _ = bin.inner.state.lock().tasks.shift_remove(&entry);
                bin.inner
                    .dispatcher
                    .dispatch(WorkItem::infallible(format!("timeout {entry}"), f));
            }),
        );

        Ok(key)
    }

    /// Disposes every task, then runs the `on_destroy` hooks.
    ///
    /// Calling this on an already destroyed bin, including re-entrantly
    /// from one of its own tasks, does nothing.
    pub fn destroy(&self) {
        self.inner.teardown();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns true once the bin has been destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.state.lock().destroyed
    }

    /// Returns the number of tasks currently owned.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.inner.state.lock().tasks.len()
    }

    /// Returns true if a task is registered under `key`.
    #[must_use]
    pub fn contains(&self, key: impl Into<TaskKey>) -> bool {
        self.inner.state.lock().tasks.contains_key(&key.into())
    }

    /// Returns true if at least one live task carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        let state = self.inner.state.lock();
        state
            .tags
            .get(tag)
            .is_some_and(|keys| keys.iter().any(|key| state.tasks.contains_key(key)))
    }

    /// Returns the keys of live tasks carrying `tag`, in registration order.
    #[must_use]
    pub fn find_by_tag(&self, tag: &str) -> Vec<TaskKey> {
        let state = self.inner.state.lock();
        let Some(keys) = state.tags.get(tag) else {
            return Vec::new();
        };
        state
            .tasks
            .keys()
            .filter(|key| keys.contains(*key))
            .cloned()
            .collect()
    }

    /// Returns every tag carried by at least one live task, sorted.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        let mut tags: Vec<String> = state
            .tags
            .iter()
            .filter(|(_, keys)| keys.iter().any(|key| state.tasks.contains_key(key)))
            .map(|(tag, _)| tag.clone())
            .collect();
        tags.sort();
        tags
    }
}

impl fmt::Debug for Bin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Bin")
            .field("tasks", &state.tasks.len())
            .field("tags", &state.tags.len())
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WeakBin
// ─────────────────────────────────────────────────────────────────────────────

/// Non-owning handle to a [`Bin`].
#[derive(Clone, Default)]
pub struct WeakBin {
    inner: Weak<BinInner>,
}

impl WeakBin {
    /// Returns the bin if any strong handle is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Bin> {
        self.inner.upgrade().map(|inner| Bin { inner })
    }

    /// Returns true if this handle refers to `bin`.
    #[must_use]
    pub fn ptr_eq(&self, bin: &Bin) -> bool {
        core::ptr::eq(self.inner.as_ptr(), Arc::as_ptr(&bin.inner))
    }
}

impl fmt::Debug for WeakBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakBin")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}
