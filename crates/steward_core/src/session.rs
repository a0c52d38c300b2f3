//! Per-session resource bins.
//!
//! A session is any keyed stretch of runtime, such as a connected player
//! or an open document, that owns resources which must not outlive it.
//! [`Sessions`] is the explicit registry of the live ones: one [`Bin`] per
//! key, created by [`Sessions::begin`] and destroyed by [`Sessions::end`].

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use steward_bin::{Bin, Dispatch, InlineDispatch};
use steward_host::{Host, Plugin};

type Registry = Mutex<IndexMap<String, Bin>>;

/// Registry of live session bins, keyed by session id.
///
/// `Sessions` is a clonable handle; clones share the registry. A session
/// bin leaves the registry when it is destroyed by any path, whether
/// through [`end`](Self::end), [`end_all`](Self::end_all) or a direct
/// [`Bin::destroy`].
///
/// # Example
///
/// ```
/// use steward_bin::Task;
/// use steward_core::Sessions;
///
/// let sessions = Sessions::new();
/// let bin = sessions.begin("player-7");
/// bin.add(Task::callback(|| println!("despawn player-7"))).unwrap();
///
/// assert!(sessions.contains("player-7"));
/// assert!(sessions.end("player-7"));
/// assert!(bin.is_destroyed());
/// assert!(sessions.is_empty());
/// ```
#[derive(Clone)]
pub struct Sessions {
    registry: Arc<Registry>,
    dispatcher: Arc<dyn Dispatch>,
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new()
    }
}

impl Sessions {
    /// Creates an empty registry whose bins dispose inline.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dispatcher(Arc::new(InlineDispatch))
    }

    /// Creates an empty registry whose bins use `dispatcher`.
    #[must_use]
    pub fn with_dispatcher(dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(IndexMap::new())),
            dispatcher,
        }
    }

    /// Starts the session `key` and returns its bin.
    ///
    /// A session already running under `key` is ended first.
    pub fn begin(&self, key: impl Into<String>) -> Bin {
        let key = key.into();

        let prior = self.registry.lock().shift_remove(&key);
        if let Some(prior) = prior {
            tracing::warn!(session = %key, "session already active; ending it");
            prior.destroy();
        }

        let bin = Bin::with_dispatcher(Arc::clone(&self.dispatcher));
        let registry: Weak<Registry> = Arc::downgrade(&self.registry);
        let weak = bin.downgrade();
        let hook_key = key.clone();
        bin.on_destroy(move || {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            let removed = {
                let mut sessions = registry.lock();
                if sessions.get(&hook_key).is_some_and(|bin| weak.ptr_eq(bin)) {
                    sessions.shift_remove(&hook_key)
                } else {
                    None
                }
            };
            if removed.is_some() {
                tracing::debug!(session = %hook_key, "session bin destroyed");
            }
        });

        let displaced = self.registry.lock().insert(key.clone(), bin.clone());
        // Only reachable if ending the prior session began a new one.
        if let Some(displaced) = displaced {
            tracing::warn!(session = %key, "session began during its own replacement");
            displaced.destroy();
        }

        tracing::debug!(session = %key, "session started");
        bin
    }

    /// Returns the bin of the live session `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Bin> {
        self.registry.lock().get(key).cloned()
    }

    /// Ends the session `key`, destroying its bin.
    ///
    /// Returns false if no such session is live.
    pub fn end(&self, key: &str) -> bool {
        let removed = self.registry.lock().shift_remove(key);
        match removed {
            Some(bin) => {
                bin.destroy();
                tracing::debug!(session = %key, "session ended");
                true
            }
            None => false,
        }
    }

    /// Ends every live session in start order. Returns how many were ended.
    pub fn end_all(&self) -> usize {
        let sessions = core::mem::take(&mut *self.registry.lock());
        let count = sessions.len();
        for (key, bin) in sessions {
            bin.destroy();
            tracing::debug!(session = %key, "session ended");
        }
        count
    }

    /// Returns true if the session `key` is live.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.registry.lock().contains_key(key)
    }

    /// Keys of live sessions, in start order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.registry.lock().keys().cloned().collect()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    /// Returns true if no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }
}

impl core::fmt::Debug for Sessions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sessions")
            .field("live", &self.registry.lock().len())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionPlugin
// ─────────────────────────────────────────────────────────────────────────────

/// Inserts a [`Sessions`] resource and ends every session on shutdown.
///
/// # Resources Provided
///
/// | Resource | Description |
/// |----------|-------------|
/// | [`Sessions`] | Shared session registry handle |
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionPlugin;

impl Plugin for SessionPlugin {
    fn build(&self, host: &mut Host) {
        host.insert_resource(Sessions::new());
    }

    fn cleanup(&self, host: &mut Host) {
        if let Some(sessions) = host.resource::<Sessions>() {
            let ended = sessions.end_all();
            tracing::debug!(ended, "sessions ended on shutdown");
        }
    }
}
