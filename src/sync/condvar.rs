//! An async condition variable.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::io::Bridge;
use crate::queue::Queue;
use crate::sync::mutex::{Mutex, MutexGuard};

/// A condition variable for coordinating tasks that share a [`Mutex`].
///
/// Unlike the mutex and shared-mutex locks, a `CondVar` carries no state of
/// its own beyond its waiter queue — it is purely a rendezvous point.
/// Wakeups may be spurious in the same sense `std::sync::Condvar`'s are;
/// always wait on a predicate (see [`CondVar::wait_while`]) rather than a
/// bare notification.
#[derive(Default)]
pub struct CondVar {
    waiters: Queue<Arc<Bridge>>,
}

impl CondVar {
    pub fn new() -> Self {
        Self {
            waiters: Queue::new(),
        }
    }

    /// Atomically releases `guard` and parks the calling task until
    /// notified, then re-acquires the mutex before returning.
    pub async fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        let mutex = guard.mutex;
        let bridge = Arc::new(Bridge::new());
        self.waiters.push(bridge.clone());
        drop(guard);
        Notified(&bridge).await;
        mutex.lock().await
    }

    /// Repeatedly waits until `condition` returns `false`, re-checking it
    /// under the lock after every wakeup.
    pub async fn wait_while<'a, T>(
        &self,
        mut guard: MutexGuard<'a, T>,
        mut condition: impl FnMut(&mut T) -> bool,
    ) -> MutexGuard<'a, T> {
        while condition(&mut guard) {
            guard = self.wait(guard).await;
        }
        guard
    }

    /// Wakes one waiting task, if any.
    pub fn notify_one(&self) {
        if let Some(bridge) = self.waiters.pop() {
            bridge.finish();
        }
    }

    /// Wakes every currently waiting task.
    pub fn notify_all(&self) {
        while let Some(bridge) = self.waiters.pop() {
            bridge.finish();
        }
    }
}

struct Notified<'a>(&'a Bridge);

impl Future for Notified<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0.is_ready() {
            return Poll::Ready(());
        }
        self.0.park(cx.waker().clone());
        if self.0.is_ready() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Executor;
    use std::sync::Arc;

    #[test]
    fn notify_one_wakes_a_single_waiter() {
        let exec = Executor::new(2, 1);
        let mutex = Arc::new(Mutex::new(false));
        let cv = Arc::new(CondVar::new());

        exec.block_on(|| {
            let mutex = mutex.clone();
            let cv = cv.clone();
            async move {
                let waiter = {
                    let mutex = mutex.clone();
                    let cv = cv.clone();
                    crate::task::spawn(async move {
                        let guard = mutex.lock().await;
                        let guard = cv.wait_while(guard, |ready| !*ready).await;
                        assert!(*guard);
                    })
                };
                crate::task::yield_now().await;
                {
                    let mut guard = mutex.lock().await;
                    *guard = true;
                }
                cv.notify_one();
                waiter.await.unwrap();
            }
        });
    }
}
