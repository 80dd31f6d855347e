//! An async shared/exclusive (reader-writer) lock.

use std::cell::UnsafeCell;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, Waker};

use crate::queue::Queue;

const EXCLUSIVE: usize = 1 << (usize::BITS - 1);

/// A reader-writer lock whose `read`/`write` operations are `async fn`s.
///
/// Any number of readers may hold the lock concurrently; a writer excludes
/// everyone else. This implementation does not favor writers over readers
/// (or vice versa) — under sustained read pressure a writer may wait
/// longer than it would with writer-preference, but it is never starved
/// indefinitely in practice since reader arrivals are not infinite.
pub struct SharedMutex<T: ?Sized> {
    state: AtomicUsize,
    readers: Queue<Waker>,
    writers: Queue<Waker>,
    value: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for SharedMutex<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for SharedMutex<T> {}

impl<T> SharedMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: AtomicUsize::new(0),
            readers: Queue::new(),
            writers: Queue::new(),
            value: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: ?Sized> SharedMutex<T> {
    pub async fn read(&self) -> SharedMutexReadGuard<'_, T> {
        ReadFuture { lock: self }.await
    }

    pub async fn write(&self) -> SharedMutexWriteGuard<'_, T> {
        WriteFuture { lock: self }.await
    }

    pub fn try_read(&self) -> Option<SharedMutexReadGuard<'_, T>> {
        self.acquire_read().then(|| SharedMutexReadGuard { lock: self })
    }

    pub fn try_write(&self) -> Option<SharedMutexWriteGuard<'_, T>> {
        self.state
            .compare_exchange(0, EXCLUSIVE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then(|| SharedMutexWriteGuard { lock: self })
    }

    fn acquire_read(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current & EXCLUSIVE != 0 {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    fn release_read(&self) {
        let previous = self.state.fetch_sub(1, Ordering::AcqRel);
        if previous - 1 == 0 {
            // Last reader out: drain every waiter, reader and writer alike,
            // and let each re-run its own acquire on the next poll. A single
            // pop here would let one stale waker (left behind by a future
            // that raced to `Ready` on its own recheck) swallow the wakeup
            // meant for whichever waiter is actually still parked.
            while let Some(writer) = self.writers.pop() {
                writer.wake();
            }
            while let Some(reader) = self.readers.pop() {
                reader.wake();
            }
        }
    }

    fn release_write(&self) {
        self.state.store(0, Ordering::Release);
        while let Some(reader) = self.readers.pop() {
            reader.wake();
        }
        while let Some(writer) = self.writers.pop() {
            writer.wake();
        }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

impl<T: ?Sized + Default> Default for SharedMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

struct ReadFuture<'a, T: ?Sized> {
    lock: &'a SharedMutex<T>,
}

impl<'a, T: ?Sized> Future for ReadFuture<'a, T> {
    type Output = SharedMutexReadGuard<'a, T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.lock.acquire_read() {
            return Poll::Ready(SharedMutexReadGuard { lock: self.lock });
        }
        // Publish interest, then only make sure someone gets woken to
        // re-check — never resolve ourselves here, or our own waker is
        // left stranded in `readers` for a later release to burn on a task
        // that's already running.
        self.lock.readers.push(cx.waker().clone());
        if self.lock.state.load(Ordering::Acquire) & EXCLUSIVE == 0 {
            if let Some(waker) = self.lock.readers.pop() {
                waker.wake();
            }
        }
        Poll::Pending
    }
}

struct WriteFuture<'a, T: ?Sized> {
    lock: &'a SharedMutex<T>,
}

impl<'a, T: ?Sized> Future for WriteFuture<'a, T> {
    type Output = SharedMutexWriteGuard<'a, T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let try_acquire = || {
            self.lock
                .state
                .compare_exchange(0, EXCLUSIVE, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        };
        if try_acquire() {
            return Poll::Ready(SharedMutexWriteGuard { lock: self.lock });
        }
        // Same rule as `ReadFuture`: publish, then at most wake a popped
        // waiter (possibly ourselves, possibly not) and stay pending.
        self.lock.writers.push(cx.waker().clone());
        if self.lock.state.load(Ordering::Acquire) == 0 {
            if let Some(waker) = self.lock.writers.pop() {
                waker.wake();
            }
        }
        Poll::Pending
    }
}

/// An RAII guard for a shared (read) acquisition of a [`SharedMutex`].
pub struct SharedMutexReadGuard<'a, T: ?Sized> {
    lock: &'a SharedMutex<T>,
}

impl<T: ?Sized> Deref for SharedMutexReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: holding this guard proves we hold a share of the lock.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: ?Sized> Drop for SharedMutexReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// An RAII guard for an exclusive (write) acquisition of a [`SharedMutex`].
pub struct SharedMutexWriteGuard<'a, T: ?Sized> {
    lock: &'a SharedMutex<T>,
}

impl<T: ?Sized> Deref for SharedMutexWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // Safety: holding this guard proves exclusive ownership.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: ?Sized> DerefMut for SharedMutexWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: see above.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T: ?Sized> Drop for SharedMutexWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Executor;
    use std::sync::Arc;

    #[test]
    fn concurrent_readers_allowed() {
        let exec = Executor::new(1, 1);
        let lock = SharedMutex::new(0);
        exec.block_on(|| async {
            let a = lock.read().await;
            let b = lock.read().await;
            assert_eq!(*a, 0);
            assert_eq!(*b, 0);
            assert!(lock.try_write().is_none());
        });
    }

    #[test]
    fn writer_excludes_everyone() {
        let exec = Executor::new(1, 1);
        let lock = SharedMutex::new(0);
        exec.block_on(|| async {
            let mut w = lock.write().await;
            *w = 7;
            assert!(lock.try_read().is_none());
            assert!(lock.try_write().is_none());
            drop(w);
            assert_eq!(*lock.read().await, 7);
        });
    }

    #[test]
    fn writers_serialize_under_contention() {
        let exec = Executor::new(4, 1);
        let lock = Arc::new(SharedMutex::new(0usize));
        exec.block_on(|| {
            let lock = lock.clone();
            async move {
                let handles: Vec<_> = (0..100)
                    .map(|_| {
                        let lock = lock.clone();
                        crate::task::spawn(async move {
                            let mut guard = lock.write().await;
                            *guard += 1;
                        })
                    })
                    .collect();
                for h in handles {
                    h.await.unwrap();
                }
            }
        });
        assert_eq!(*lock.try_read().unwrap(), 100);
    }
}
