//! Subscribable event sources and their subscription handles.
//!
//! A [`Signal`] is the simplest event source a host can offer: listeners
//! connect to it and receive every fired value until their [`Subscription`]
//! is disconnected. Signals back both the frame tick and end-of-life
//! notifications.
//!
//! Dropping a [`Subscription`] does **not** disconnect it. Ownership of the
//! connection is meant to be handed to a [`Bin`](crate::Bin), which
//! disconnects it on teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::bin::OwnerSlot;
use crate::dispatch::WorkItem;

// ─────────────────────────────────────────────────────────────────────────────
// Subscription
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a live connection with an event source.
pub struct Subscription {
    connected: Arc<AtomicBool>,
    detach: Option<Box<dyn FnOnce() + Send>>,
    owner: Option<OwnerSlot>,
}

impl Subscription {
    /// Wraps an external connection. `detach` runs once, on the first
    /// [`disconnect`](Self::disconnect).
    #[must_use]
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self::from_parts(Arc::new(AtomicBool::new(true)), Some(Box::new(detach)))
    }

    pub(crate) fn from_parts(
        connected: Arc<AtomicBool>,
        detach: Option<Box<dyn FnOnce() + Send>>,
    ) -> Self {
        Self {
            connected,
            detach,
            owner: None,
        }
    }

    /// Attaches a slot that every bin adopting this subscription rewrites
    /// with its own handle and key.
    pub(crate) fn with_owner(mut self, owner: OwnerSlot) -> Self {
        self.owner = Some(owner);
        self
    }

    pub(crate) fn owner(&self) -> Option<&OwnerSlot> {
        self.owner.as_ref()
    }

    /// Returns true until the subscription is disconnected, either through
    /// this handle or by the source itself.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Disconnects from the source. Calling this more than once is a no-op.
    pub fn disconnect(&mut self) {
        let was_connected = self.connected.swap(false, Ordering::SeqCst);
        if let Some(detach) = self.detach.take()
            && was_connected
        {
            detach();
        }
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("connected", &self.is_connected())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Signal
// ─────────────────────────────────────────────────────────────────────────────

enum Listener<T> {
    Repeat(Arc<dyn Fn(&T) + Send + Sync>),
    Once(Arc<Mutex<Option<Box<dyn FnOnce(&T) + Send>>>>),
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Repeat(f) => Self::Repeat(Arc::clone(f)),
            Self::Once(f) => Self::Once(Arc::clone(f)),
        }
    }
}

struct Slot<T> {
    id: u64,
    connected: Arc<AtomicBool>,
    listener: Listener<T>,
}

struct SignalInner<T> {
    next_id: u64,
    slots: Vec<Slot<T>>,
}

/// A multicast event source.
///
/// Listeners run in connection order. Firing snapshots the listener list and
/// releases the internal lock before any listener runs, so listeners may
/// connect, disconnect or fire re-entrantly. A panicking listener is logged
/// and does not prevent the remaining listeners from running.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use steward_bin::Signal;
///
/// let signal = Signal::<u32>::new();
/// let total = Arc::new(AtomicU32::new(0));
///
/// let t = Arc::clone(&total);
/// let mut sub = signal.connect(move |v| {
///     t.fetch_add(*v, Ordering::SeqCst);
/// });
///
/// signal.fire(&2);
/// sub.disconnect();
/// signal.fire(&40);
///
/// assert_eq!(total.load(Ordering::SeqCst), 2);
/// ```
pub struct Signal<T> {
    inner: Arc<Mutex<SignalInner<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Signal<T> {
    /// Creates a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SignalInner {
                next_id: 0,
                slots: Vec::new(),
            })),
        }
    }

    /// Connects a listener that receives every fired value.
    pub fn connect(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.attach(Listener::Repeat(Arc::new(listener)))
    }

    /// Connects a listener that receives only the next fired value, after
    /// which the subscription reports itself disconnected.
    pub fn connect_once(&self, listener: impl FnOnce(&T) + Send + 'static) -> Subscription {
        self.attach(Listener::Once(Arc::new(Mutex::new(Some(Box::new(
            listener,
        ))))))
    }

    fn attach(&self, listener: Listener<T>) -> Subscription {
        let connected = Arc::new(AtomicBool::new(true));
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.slots.push(Slot {
                id,
                connected: Arc::clone(&connected),
                listener,
            });
            id
        };

        let weak: Weak<Mutex<SignalInner<T>>> = Arc::downgrade(&self.inner);
        Subscription::from_parts(
            connected,
            Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.lock().slots.retain(|slot| slot.id != id);
                }
            })),
        )
    }

    /// Delivers `value` to every connected listener.
    pub fn fire(&self, value: &T) {
        let snapshot: Vec<(Arc<AtomicBool>, Listener<T>)> = {
            let mut inner = self.inner.lock();
            let snapshot = inner
                .slots
                .iter()
                .map(|slot| (Arc::clone(&slot.connected), slot.listener.clone()))
                .collect();
            // One-shot listeners are consumed by this delivery.
            inner
                .slots
                .retain(|slot| matches!(slot.listener, Listener::Repeat(_)));
            snapshot
        };

        for (connected, listener) in snapshot {
            match listener {
                Listener::Repeat(f) => {
                    if connected.load(Ordering::SeqCst) {
                        deliver(|| f(value));
                    }
                }
                Listener::Once(f) => {
                    if connected.swap(false, Ordering::SeqCst)
                        && let Some(f) = f.lock().take()
                    {
                        deliver(|| f(value));
                    }
                }
            }
        }
    }

    /// Returns the number of listeners currently connected.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.connected.load(Ordering::SeqCst))
            .count()
    }
}

/// Runs one listener with panic isolation.
fn deliver(f: impl FnOnce()) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    if let Err(payload) = result {
        tracing::error!(
            error = %crate::dispatch::panic_message(payload.as_ref()),
            "signal listener panicked"
        );
    }
}

impl<T> core::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.inner.lock().slots.len())
            .finish()
    }
}

/// Disconnects a subscription with failure isolation.
pub(crate) fn disconnect_isolated(label: String, mut subscription: Subscription) {
    WorkItem::infallible(label, move || subscription.disconnect()).run_logged();
}
