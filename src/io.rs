//! The I/O completion bridge.
//!
//! This is the seam between the scheduler and the world of callback-driven
//! asynchronous I/O (UDP sockets, files, resolver lookups — all out of
//! scope for this crate, but built on top of it). A [`Bridge`] is a
//! single-use wait cell shared between the task that awaits an operation
//! and the callback that completes it: whichever side arrives second does
//! the work of resuming the parked task.
//!
//! Both sides use the protocol exactly once per bridge. The callback path
//! is the only writer of whatever result slot the operation wraps around
//! the bridge; the awaiting task reads it only after observing `finished`.

use std::sync::atomic::{AtomicPtr, Ordering};
use std::task::Waker;

/// Sentinel pointer meaning "the operation has finished". Distinguished
/// from any real boxed-`Waker` pointer because it points at a `static`,
/// never at the heap.
static FINISHED_SENTINEL: u8 = 0;

fn finished_ptr() -> *mut Waker {
    std::ptr::addr_of!(FINISHED_SENTINEL) as *mut Waker
}

/// A single-use bridge between an awaiting task and the callback that
/// eventually completes its operation.
///
/// State is one of: nobody has awaited yet (null), a task is parked
/// (boxed-waker pointer), or the operation already finished (sentinel).
#[derive(Debug)]
pub struct Bridge {
    state: AtomicPtr<Waker>,
}

impl Bridge {
    pub const fn new() -> Self {
        Self {
            state: AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    /// Returns `true` if the operation this bridge guards has already
    /// completed.
    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == finished_ptr()
    }

    /// Parks `waker` on this bridge so it is resumed when [`Bridge::finish`]
    /// is called.
    ///
    /// If the operation raced ahead and finished between the caller's
    /// `is_ready` check and this call, the waker is woken immediately
    /// instead of being stored.
    pub fn park(&self, waker: Waker) {
        let boxed = Box::into_raw(Box::new(waker));
        let prev = self.state.swap(boxed, Ordering::AcqRel);
        if prev == finished_ptr() {
            // Safety: `boxed` was just created above and ownership has not
            // escaped anywhere else; we are the sole owner of the swap's
            // new value until we read it back out here.
            let waker = unsafe { Box::from_raw(boxed) };
            waker.wake();
            // restore the finished marker we displaced.
            self.state.store(finished_ptr(), Ordering::Release);
        } else if !prev.is_null() {
            // A still-parked waker from an earlier poll is being replaced
            // (a pending future re-registering on every poll, as `Sleep`
            // does). It will never be woken now; drop it rather than leak
            // it.
            // Safety: see `finish` — any non-null, non-sentinel value was
            // created by a prior `park` via `Box::into_raw` and has not
            // been read anywhere else.
            drop(unsafe { Box::from_raw(prev) });
        }
    }

    /// Marks the bridge as finished, waking the parked task if one was
    /// registered.
    ///
    /// Safe to call without a prior `park` (the awaiter will observe
    /// `is_ready() == true` the next time it polls).
    pub fn finish(&self) {
        let prev = self.state.swap(finished_ptr(), Ordering::AcqRel);
        if !prev.is_null() && prev != finished_ptr() {
            // Safety: any non-null, non-sentinel value was created by
            // `park` via `Box::into_raw` and is only ever read once, here.
            let waker = unsafe { Box::from_raw(prev) };
            waker.wake();
        }
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let state = *self.state.get_mut();
        if !state.is_null() && state != finished_ptr() {
            // Safety: see `finish`.
            drop(unsafe { Box::from_raw(state) });
        }
    }
}

// Safety: the bridge only ever exposes `Waker` through the atomic swap
// protocol above, never aliased.
unsafe impl Send for Bridge {}
unsafe impl Sync for Bridge {}

/// A minimal non-blocking read interface for adapters layered on top of the
/// bridge (UDP sockets, files, ...). The runtime core ships this trait but
/// implements none of it; concrete bindings are out of scope.
pub trait Read {
    type Err: std::error::Error;

    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut [u8],
    ) -> std::task::Poll<Result<usize, Self::Err>>;
}

/// A minimal non-blocking write interface, the `Write` counterpart to
/// [`Read`].
pub trait Write {
    type Err: std::error::Error;

    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<Result<usize, Self::Err>>;

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Err>>;
}
