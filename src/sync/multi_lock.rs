//! Deadlock-free acquisition of several mutexes at once.

use crate::sync::mutex::{Mutex, MutexGuard};
use crate::task::yield_now;

/// Acquires every mutex in `mutexes`, returning their guards in the same
/// order, without risking deadlock against another call acquiring the same
/// set in a different order.
///
/// Each attempt blocks on one mutex (rotating which one, across retries)
/// and only `try_lock`s the rest; if any of those fail, every guard
/// acquired so far is released and the whole attempt retries starting from
/// the next mutex in rotation. No caller can deadlock against another
/// caller of this function because no attempt ever blocks while holding a
/// lock another attempt might need.
pub async fn lock_all<'a, T>(mutexes: &[&'a Mutex<T>]) -> Vec<MutexGuard<'a, T>> {
    if mutexes.is_empty() {
        return Vec::new();
    }

    let mut start = 0;
    loop {
        let first = mutexes[start].lock().await;
        let mut acquired = vec![(start, first)];
        let mut ok = true;

        for step in 1..mutexes.len() {
            let idx = (start + step) % mutexes.len();
            match mutexes[idx].try_lock() {
                Some(guard) => acquired.push((idx, guard)),
                None => {
                    ok = false;
                    break;
                }
            }
        }

        if ok {
            acquired.sort_by_key(|(idx, _)| *idx);
            return acquired.into_iter().map(|(_, guard)| guard).collect();
        }

        drop(acquired);
        start = (start + 1) % mutexes.len();
        yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Executor;
    use std::sync::Arc;

    #[test]
    fn acquires_all_locks() {
        let exec = Executor::new(1, 1);
        let a = Mutex::new(1);
        let b = Mutex::new(2);
        let c = Mutex::new(3);
        exec.block_on(|| async {
            let guards = lock_all(&[&a, &b, &c]).await;
            assert_eq!(*guards[0], 1);
            assert_eq!(*guards[1], 2);
            assert_eq!(*guards[2], 3);
        });
    }

    #[test]
    fn concurrent_acquisition_in_opposite_orders_does_not_deadlock() {
        let exec = Executor::new(4, 1);
        let a = Arc::new(Mutex::new(0usize));
        let b = Arc::new(Mutex::new(0usize));
        exec.block_on(|| {
            let a = a.clone();
            let b = b.clone();
            async move {
                let handles: Vec<_> = (0..50)
                    .map(|i| {
                        let a = a.clone();
                        let b = b.clone();
                        crate::task::spawn(async move {
                            if i % 2 == 0 {
                                let mut guards = lock_all(&[&*a, &*b]).await;
                                *guards[0] += 1;
                                *guards[1] += 1;
                            } else {
                                let mut guards = lock_all(&[&*b, &*a]).await;
                                *guards[0] += 1;
                                *guards[1] += 1;
                            }
                        })
                    })
                    .collect();
                for h in handles {
                    h.await.unwrap();
                }
            }
        });
        assert_eq!(*a.try_lock().unwrap(), 50);
        assert_eq!(*b.try_lock().unwrap(), 50);
    }
}
