//! An async mutual-exclusion lock.

use std::cell::UnsafeCell;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};

use crate::queue::Queue;

/// A mutex whose `lock` is an `async fn`: a task that cannot acquire it
/// immediately parks instead of blocking its worker thread.
pub struct Mutex<T: ?Sized> {
    locked: AtomicBool,
    waiters: Queue<Waker>,
    value: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            waiters: Queue::new(),
            value: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires the lock, waiting if it is currently held elsewhere.
    pub async fn lock(&self) -> MutexGuard<'_, T> {
        LockFuture { mutex: self }.await
    }

    /// Acquires the lock only if it is immediately available.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.acquire().then(|| MutexGuard { mutex: self })
    }

    fn acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.locked.store(false, Ordering::Release);
        // Wake exactly one waiter; it will race to re-acquire via CAS and,
        // if it loses, simply re-parks. A failed CAS here only means some
        // other task (a fresh `try_lock`, or a waiter popped concurrently)
        // got there first, never that the lock is stuck held.
        if let Some(waker) = self.waiters.pop() {
            waker.wake();
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

impl<T: ?Sized + Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

struct LockFuture<'a, T: ?Sized> {
    mutex: &'a Mutex<T>,
}

impl<'a, T: ?Sized> Future for LockFuture<'a, T> {
    type Output = MutexGuard<'a, T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.mutex.acquire() {
            return Poll::Ready(MutexGuard { mutex: self.mutex });
        }
        // Publish our interest, then re-check: otherwise a `release` that
        // ran between our failed CAS above and this push would drain an
        // empty queue and we would never be woken. Once we've pushed, we
        // never complete our own suspend here — we only make sure someone
        // gets woken to re-check, popping and waking one waiter (which may
        // or may not be us) if the lock looks free. Acquiring here instead
        // would leave our own waker stranded in the queue for a later
        // `release` to pop and burn on a task that's already running.
        self.mutex.waiters.push(cx.waker().clone());
        if !self.mutex.locked.load(Ordering::Acquire) {
            if let Some(waker) = self.mutex.waiters.pop() {
                waker.wake();
            }
        }
        Poll::Pending
    }
}

/// An RAII guard for a locked [`Mutex`]. Unlocks on drop.
pub struct MutexGuard<'a, T: ?Sized> {
    pub(crate) mutex: &'a Mutex<T>,
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: holding a `MutexGuard` proves we own the exclusive lock.
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: see above.
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Executor;
    use std::sync::Arc;

    #[test]
    fn mutual_exclusion_under_contention() {
        let exec = Executor::new(4, 1);
        let mutex = Arc::new(Mutex::new(0usize));
        exec.block_on(|| {
            let mutex = mutex.clone();
            async move {
                let handles: Vec<_> = (0..200)
                    .map(|_| {
                        let mutex = mutex.clone();
                        crate::task::spawn(async move {
                            let mut guard = mutex.lock().await;
                            *guard += 1;
                        })
                    })
                    .collect();
                for h in handles {
                    h.await.unwrap();
                }
            }
        });
        assert_eq!(*mutex.try_lock().unwrap(), 200);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let exec = Executor::new(1, 1);
        let mutex = Mutex::new(());
        exec.block_on(|| async {
            let _guard = mutex.lock().await;
            assert!(mutex.try_lock().is_none());
        });
    }
}
