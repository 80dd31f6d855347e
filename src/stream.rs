//! A lazy sequence of values, produced and consumed across task
//! boundaries.
//!
//! Unlike a [`Future`], which resolves once, a [`Stream`] yields any number
//! of items over its lifetime. This module provides the trait plus a
//! simple channel-backed implementation: a producer pushes values through
//! a [`Sender`], a consumer pulls them one at a time through the paired
//! [`Receiver`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::queue::Queue;

/// A sequence of values produced asynchronously, one at a time.
pub trait Stream {
    type Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>>;
}

/// Extension methods built on top of [`Stream::poll_next`].
pub trait StreamExt: Stream {
    /// Returns a future resolving to the next item, or `None` once the
    /// stream is exhausted.
    fn next(&mut self) -> Next<'_, Self>
    where
        Self: Unpin,
    {
        Next(self)
    }

    /// Drives the stream to completion, calling `f` with each item in
    /// order.
    async fn for_each<F>(mut self, mut f: F)
    where
        Self: Sized + Unpin,
        F: FnMut(Self::Item),
    {
        while let Some(item) = self.next().await {
            f(item);
        }
    }
}

impl<S: Stream + ?Sized> StreamExt for S {}

pub struct Next<'a, S: ?Sized>(&'a mut S);

impl<S: Stream + Unpin + ?Sized> Future for Next<'_, S> {
    type Output = Option<S::Item>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut *self.0).poll_next(cx)
    }
}

struct Shared<T> {
    queue: Queue<T>,
    closed: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

/// The producing half of a channel-backed [`Stream`].
///
/// Sending never blocks — the channel is unbounded. Dropping every
/// `Sender` closes the stream, so the paired [`Receiver`] observes the end
/// of the sequence (this happens automatically if a producer task panics
/// mid-sequence: the `Sender` it owned is dropped during unwinding).
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

/// The consuming half of a channel-backed [`Stream`].
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

/// Creates a new channel-backed stream, returning its producing and
/// consuming halves.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        queue: Queue::new(),
        closed: AtomicBool::new(false),
        waker: Mutex::new(None),
    });
    (
        Sender {
            shared: shared.clone(),
        },
        Receiver { shared },
    )
}

impl<T> Sender<T> {
    /// Pushes a value into the stream.
    pub fn send(&self, value: T) {
        self.shared.queue.push(value);
        self.wake();
    }

    fn wake(&self) {
        if let Some(waker) = self.shared.waker.lock().take() {
            waker.wake();
        }
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        // Only the last sender closes the stream.
        if Arc::strong_count(&self.shared) == 2 {
            self.shared.closed.store(true, Ordering::Release);
            self.wake();
        }
    }
}

impl<T> Stream for Receiver<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        if let Some(value) = self.shared.queue.pop() {
            return Poll::Ready(Some(value));
        }
        if self.shared.closed.load(Ordering::Acquire) {
            return Poll::Ready(None);
        }
        *self.shared.waker.lock() = Some(cx.waker().clone());
        // Re-check after publishing interest: a `send`/close that raced
        // ahead of us between the checks above and registering the waker
        // would otherwise be missed.
        if let Some(value) = self.shared.queue.pop() {
            return Poll::Ready(Some(value));
        }
        if self.shared.closed.load(Ordering::Acquire) {
            return Poll::Ready(None);
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Executor;

    #[test]
    fn producer_consumer_sequence() {
        let exec = Executor::new(2, 1);
        let (tx, rx) = channel::<usize>();
        exec.block_on(|| async move {
            let producer = crate::task::spawn(async move {
                for i in 0..10 {
                    tx.send(i);
                    crate::task::yield_now().await;
                }
            });
            let mut received = Vec::new();
            rx.for_each(|item| received.push(item)).await;
            producer.await.unwrap();
            assert_eq!(received, (0..10).collect::<Vec<_>>());
        });
    }

    #[test]
    fn panic_in_producer_closes_the_stream() {
        let exec = Executor::new(2, 1);
        let (tx, rx) = channel::<usize>();
        exec.block_on(|| async move {
            let producer = crate::task::spawn(async move {
                tx.send(1);
                panic!("producer failed mid-sequence");
            });
            let mut rx = rx;
            assert_eq!(rx.next().await, Some(1));
            assert_eq!(rx.next().await, None);
            assert!(producer.await.unwrap_err().is_panic());
        });
    }
}
