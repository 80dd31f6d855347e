//! The unbounded MPMC queue backing the reactor's run queue and the
//! blocking pool's work queue.
//!
//! Pushes and pops never block on contention. Node recycling (the
//! "freelist" the design calls for) is handled internally by
//! [`crossbeam_queue::SegQueue`], which allocates in fixed-size segments and
//! reuses emptied segments rather than individual nodes; this gives the
//! same amortized-allocation-free behaviour under steady load without a
//! hand-rolled intrusive free list.

use crossbeam_queue::SegQueue;

/// An unbounded, wait-free-push multi-producer multi-consumer queue.
#[derive(Debug)]
pub struct Queue<T> {
    inner: SegQueue<T>,
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    pub fn push(&self, value: T) {
        self.inner.push(value);
    }

    pub fn pop(&self) -> Option<T> {
        self.inner.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_per_producer() {
        let q = Queue::new();
        for i in 0..100 {
            q.push(i);
        }
        for i in 0..100 {
            assert_eq!(q.pop(), Some(i));
        }
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn concurrent_push_pop_no_loss() {
        let q = Arc::new(Queue::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let q = q.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        q.push(p * 1000 + i);
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        let mut seen = Vec::new();
        while let Some(v) = q.pop() {
            seen.push(v);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..4000).collect::<Vec<_>>());
    }
}
