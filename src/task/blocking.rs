//! The handle returned by `spawn_blocking`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::JoinError;
use crate::task::state::JoinInner;

/// A handle to a closure running on a blocking-worker thread.
///
/// Has the same tri-state join semantics as [`JoinHandle`](crate::JoinHandle):
/// awaiting it yields the closure's return value, or a [`JoinError`] if it
/// panicked; dropping it without awaiting detaches it and the closure runs
/// to completion regardless.
pub struct BlockingJoinHandle<T> {
    inner: Arc<JoinInner<T>>,
}

impl<T> BlockingJoinHandle<T> {
    pub(crate) fn new(inner: Arc<JoinInner<T>>) -> Self {
        Self { inner }
    }

    pub fn detach(self) {
        self.inner.detach();
    }
}

impl<T> Future for BlockingJoinHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_join(cx)
    }
}

impl<T> Drop for BlockingJoinHandle<T> {
    fn drop(&mut self) {
        self.inner.detach();
    }
}
