//! Shared helpers for bin integration tests.

#![allow(dead_code, reason = "not every test file uses every helper")]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use steward_bin::{CallbackError, Delay, Destroyable, Task};

/// Counts how many times the tasks it hands out were disposed.
#[derive(Clone, Default)]
pub struct DisposeLog {
    count: Arc<AtomicUsize>,
    order: Arc<Mutex<Vec<String>>>,
}

impl DisposeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback task that records `label` when disposed.
    pub fn task(&self, label: &str) -> Task {
        let count = Arc::clone(&self.count);
        let order = Arc::clone(&self.order);
        let label = label.to_owned();
        Task::callback(move || {
            count.fetch_add(1, Ordering::SeqCst);
            order.lock().push(label);
        })
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn times(&self, label: &str) -> usize {
        self.order.lock().iter().filter(|l| *l == label).count()
    }

    pub fn order(&self) -> Vec<String> {
        self.order.lock().clone()
    }
}

/// External handle whose destruction can be observed.
pub struct FakeHandle {
    pub alive: Arc<AtomicBool>,
    pub destroyed: Arc<AtomicUsize>,
}

impl FakeHandle {
    pub fn new() -> (Self, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let alive = Arc::new(AtomicBool::new(true));
        let destroyed = Arc::new(AtomicUsize::new(0));
        (
            Self {
                alive: Arc::clone(&alive),
                destroyed: Arc::clone(&destroyed),
            },
            alive,
            destroyed,
        )
    }
}

impl Destroyable for FakeHandle {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn destroy(&mut self) -> Result<(), CallbackError> {
        self.alive.store(false, Ordering::SeqCst);
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Delay facility advanced by hand.
#[derive(Clone, Default)]
pub struct ManualDelay {
    inner: Arc<Mutex<(Duration, Vec<(Duration, Box<dyn FnOnce() + Send>)>)>>,
}

impl ManualDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances time and runs everything that became due, in due order.
    pub fn advance(&self, by: Duration) {
        let due = {
            let mut inner = self.inner.lock();
            inner.0 += by;
            let now = inner.0;
            let (mut due, pending): (Vec<_>, Vec<_>) =
                inner.1.drain(..).partition(|(at, _)| *at <= now);
            inner.1 = pending;
            due.sort_by_key(|(at, _)| *at);
            due
        };
        for (_, f) in due {
            f();
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().1.len()
    }
}

impl Delay for ManualDelay {
    fn schedule(&self, after: Duration, f: Box<dyn FnOnce() + Send>) {
        let mut inner = self.inner.lock();
        let at = inner.0 + after;
        inner.1.push((at, f));
    }
}
