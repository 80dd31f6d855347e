use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::JoinError;
use crate::task::id::Id;
use crate::task::state::JoinInner;

/// A handle to a spawned task's eventual result.
///
/// Awaiting a `JoinHandle` yields `Ok(output)` once the task completes
/// normally, or `Err(JoinError)` if it panicked. Dropping a `JoinHandle`
/// without awaiting it detaches it: the task keeps running to completion,
/// its result is simply discarded once produced. It does **not** cancel
/// the task — there is no way to cancel a task through its `JoinHandle`.
pub struct JoinHandle<T> {
    id: Id,
    inner: Arc<JoinInner<T>>,
}

impl<T> JoinHandle<T> {
    pub(crate) fn new(id: Id, inner: Arc<JoinInner<T>>) -> Self {
        Self { id, inner }
    }

    /// The ID of the task this handle refers to.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Detaches the handle, explicitly giving up on the task's result.
    ///
    /// Equivalent to dropping the handle, spelled out for call sites where
    /// that intent should be visible.
    pub fn detach(self) {
        self.inner.detach();
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_join(cx)
    }
}

impl<T> Drop for JoinHandle<T> {
    fn drop(&mut self) {
        self.inner.detach();
    }
}
