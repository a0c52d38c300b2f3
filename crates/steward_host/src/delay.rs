//! Deterministic delayed execution driven by host time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use steward_bin::{Delay, WorkItem};

struct Entry {
    due: Duration,
    seq: u64,
    run: Box<dyn FnOnce() + Send>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the max-heap pops the earliest (due, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    now: Duration,
    next_seq: u64,
    entries: BinaryHeap<Entry>,
}

/// A [`Delay`] whose clock only moves when [`advance`](Self::advance) is
/// called.
///
/// The host advances its queue at the start of every tick. Entries run in
/// due order, ties broken by scheduling order. Entries scheduled while the
/// queue is running are picked up in the same advance only if they are
/// already due.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use steward_bin::Delay;
/// use steward_host::DelayQueue;
///
/// let queue = DelayQueue::new();
/// queue.schedule(Duration::from_secs(2), Box::new(|| println!("later")));
///
/// assert_eq!(queue.advance(Duration::from_secs(1)), 0);
/// assert_eq!(queue.advance(Duration::from_secs(1)), 1);
/// ```
#[derive(Clone, Default)]
pub struct DelayQueue {
    state: Arc<Mutex<QueueState>>,
}

impl DelayQueue {
    /// Creates an empty queue at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `by` and runs every entry now due.
    ///
    /// Returns the number of entries run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = {
            let mut state = self.state.lock();
            state.now = state.now.saturating_add(by);
            state.now
        };

        let mut ran = 0;
        loop {
            let next = {
                let mut state = self.state.lock();
                if state.entries.peek().is_some_and(|entry| entry.due <= target) {
                    state.entries.pop()
                } else {
                    None
                }
            };
            let Some(entry) = next else {
                break;
            };
            WorkItem::infallible("delayed execution", entry.run).run_logged();
            ran += 1;
        }
        ran
    }

    /// Time elapsed on this queue's clock.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of entries still waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Drops every waiting entry without running it. Returns how many were
    /// dropped.
    pub fn clear(&self) -> usize {
        let entries = std::mem::take(&mut self.state.lock().entries);
        entries.len()
    }
}

impl Delay for DelayQueue {
    fn schedule(&self, after: Duration, f: Box<dyn FnOnce() + Send>) {
        let mut state = self.state.lock();
        let due = state.now.saturating_add(after);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.push(Entry { due, seq, run: f });
    }
}

impl core::fmt::Debug for DelayQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DelayQueue")
            .field("now", &state.now)
            .field("pending", &state.entries.len())
            .finish()
    }
}
