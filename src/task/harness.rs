//! The harness driving a single spawned future to completion.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use parking_lot::Mutex;

use crate::error::JoinError;
use crate::reactor::Reactor;
use crate::task::id::Id;
use crate::task::join_handle::JoinHandle;
use crate::task::state::JoinInner;

/// A task that can be pushed onto a reactor's run queue and polled once.
pub(crate) trait Schedulable: Send + Sync {
    fn run(self: Arc<Self>);
}

pub(crate) type TaskRef = Arc<dyn Schedulable>;

pub(crate) struct Harness<F: Future> {
    id: Id,
    reactor: Arc<Reactor>,
    // Held for the duration of each poll. A future woken while already
    // being polled elsewhere (two references to the same harness queued at
    // once) blocks here rather than racing; when its turn comes it finds
    // the future back in the slot and re-polls, so no wake is lost. Once
    // the future completes the slot is left `None` forever and any
    // still-queued duplicate simply no-ops.
    future: Mutex<Option<Pin<Box<F>>>>,
    join: Arc<JoinInner<F::Output>>,
    span: tracing::Span,
}

impl<F> Harness<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    /// Spawns `future` onto `reactor`, running its first step synchronously
    /// on the calling thread before returning.
    pub(crate) fn spawn(
        reactor: Arc<Reactor>,
        future: F,
        name: Option<&str>,
    ) -> (Id, JoinHandle<F::Output>) {
        let id = Id::next();
        let span = tracing::debug_span!("task", id = %id, name = name.unwrap_or_default());
        let join = JoinInner::new();
        let harness = Arc::new(Harness {
            id,
            reactor,
            future: Mutex::new(Some(Box::pin(future))),
            join: join.clone(),
            span,
        });
        harness.run();
        (id, JoinHandle::new(id, join))
    }
}

impl<F> Schedulable for Harness<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn run(self: Arc<Self>) {
        let _entered = self.span.enter();
        let mut slot = self.future.lock();
        let Some(mut fut) = slot.take() else {
            return;
        };

        let waker = Waker::from(self.clone());
        let mut cx = Context::from_waker(&waker);
        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| fut.as_mut().poll(&mut cx)));

        match outcome {
            Ok(Poll::Pending) => *slot = Some(fut),
            Ok(Poll::Ready(value)) => {
                drop(slot);
                self.join.complete(Ok(value));
            }
            Err(payload) => {
                drop(slot);
                tracing::debug!(id = %self.id, "task panicked");
                self.join.complete(Err(JoinError::panic(payload)));
            }
        }
    }
}

impl<F> Wake for Harness<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn wake(self: Arc<Self>) {
        let reactor = self.reactor.clone();
        reactor.schedule(self);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.clone().wake();
    }
}
