//! Spawned tasks and the handles used to observe them.

pub mod blocking;
pub(crate) mod builder;
pub(crate) mod harness;
pub(crate) mod id;
pub(crate) mod join_handle;
pub(crate) mod state;

pub use builder::TaskBuilder;
pub use id::Id;
pub use join_handle::JoinHandle;

use std::future::Future;

use crate::executor::submit_blocking;
use crate::reactor;
use crate::task::blocking::BlockingJoinHandle;

/// Spawns `future` onto the executor context the calling code is currently
/// running inside, returning a handle to its eventual result.
///
/// The task's first step runs synchronously before `spawn` returns; only
/// once it first suspends does it become schedulable on another thread.
///
/// # Panics
///
/// Panics if called outside of an executor context.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let reactor = reactor::current();
    let (_, handle) = harness::Harness::spawn(reactor, future, None);
    handle
}

/// Submits `f` to the blocking pool of the executor context the calling
/// code is currently running inside, returning a handle to its eventual
/// result.
///
/// # Panics
///
/// Panics if called outside of an executor context.
pub fn spawn_blocking<F, T>(f: F) -> BlockingJoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let reactor = reactor::current();
    submit_blocking(&reactor.blocking, f)
}

/// Yields once to the scheduler, giving other ready tasks a chance to run
/// before this task is polled again.
///
/// # Panics
///
/// Panics if called outside of an executor context.
pub async fn yield_now() {
    reactor::current();

    struct YieldNow {
        yielded: bool,
    }

    impl Future for YieldNow {
        type Output = ();
        fn poll(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<()> {
            if self.yielded {
                std::task::Poll::Ready(())
            } else {
                self.yielded = true;
                cx.waker().wake_by_ref();
                std::task::Poll::Pending
            }
        }
    }

    YieldNow { yielded: false }.await
}
