//! Deadline queue backing [`crate::time::Sleep`].
//!
//! The reference implementation this crate is modeled on uses a hierarchical
//! timer wheel sized for tens of thousands of in-flight timers. A runtime of
//! this scope does not see that kind of timer pressure, so a binary heap
//! keyed on deadline — amortized `O(log n)` register/fire, same as a wheel
//! tier transfer, with none of the bucket-width tuning — does the job.

use std::collections::BinaryHeap;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::io::Bridge;

#[derive(Debug)]
struct Entry {
    deadline: Instant,
    id: u64,
    bridge: Arc<Bridge>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}
impl Eq for Entry {}

// Reversed so the `BinaryHeap` (a max-heap) pops the *earliest* deadline
// first.
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[derive(Debug, Default)]
pub(crate) struct TimerWheel {
    heap: BinaryHeap<Entry>,
    cancelled: std::collections::HashSet<u64>,
    next_id: u64,
}

impl TimerWheel {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            cancelled: std::collections::HashSet::new(),
            next_id: 1,
        }
    }

    pub(crate) fn register(&mut self, deadline: Instant) -> (u64, Arc<Bridge>) {
        let id = self.next_id;
        self.next_id += 1;
        let bridge = Arc::new(Bridge::new());
        self.heap.push(Entry {
            deadline,
            id,
            bridge: bridge.clone(),
        });
        (id, bridge)
    }

    pub(crate) fn cancel(&mut self, id: u64) {
        self.cancelled.insert(id);
    }

    /// Fires every entry whose deadline has passed, returning how many were
    /// fired (cancelled entries are discarded silently and don't count).
    pub(crate) fn turn(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while let Some(top) = self.heap.peek() {
            if top.deadline > now {
                break;
            }
            let entry = self.heap.pop().expect("just peeked");
            if self.cancelled.remove(&entry.id) {
                continue;
            }
            entry.bridge.finish();
            fired += 1;
        }
        fired
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|e| e.deadline)
    }
}
