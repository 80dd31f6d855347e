//! The executor: a pool of core worker threads driving the reactor, plus a
//! separate pool of blocking workers for synchronous offload.
//!
//! Core workers drive cooperative, non-blocking `Future`s; nothing one task
//! does should ever make another wait longer than its own poll takes.
//! Blocking workers exist for exactly the opposite kind of work — calls
//! that block the OS thread — so that kind of work never starves the core
//! pool.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll, Wake, Waker};
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::error::JoinError;
use crate::queue::Queue;
use crate::reactor::{ContextGuard, Reactor, RunOutcome};
use crate::task::blocking::BlockingJoinHandle;
use crate::task::harness::Harness;
use crate::task::join_handle::JoinHandle;
use crate::task::state::JoinInner;

pub(crate) struct BlockingJob {
    run: Box<dyn FnOnce() + Send>,
}

/// The blocking-worker side of an executor: a queue of synchronous jobs and
/// the threads draining it.
#[derive(Debug)]
pub(crate) struct BlockingPool {
    queue: Queue<BlockingJob>,
    pending: AtomicUsize,
    lock: Mutex<()>,
    cv: Condvar,
    done: AtomicBool,
}

impl std::fmt::Debug for BlockingJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingJob").finish_non_exhaustive()
    }
}

impl BlockingPool {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Queue::new(),
            pending: AtomicUsize::new(0),
            lock: Mutex::new(()),
            cv: Condvar::new(),
            done: AtomicBool::new(false),
        })
    }

    pub(crate) fn submit(&self, job: BlockingJob) {
        self.queue.push(job);
        self.pending.fetch_add(1, Ordering::Release);
        let _guard = self.lock.lock();
        self.cv.notify_one();
    }

    fn worker_loop(self: Arc<Self>) {
        loop {
            if let Some(job) = self.queue.pop() {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                (job.run)();
                continue;
            }
            let mut guard = self.lock.lock();
            if self.done.load(Ordering::Acquire) {
                break;
            }
            if self.pending.load(Ordering::Acquire) > 0 {
                continue;
            }
            self.cv.wait(&mut guard);
        }
    }

    fn shutdown(&self) {
        self.done.store(true, Ordering::Release);
        let _guard = self.lock.lock();
        self.cv.notify_all();
    }
}

struct ParkWaker {
    notified: Mutex<bool>,
    cv: Condvar,
}

impl ParkWaker {
    fn park(&self) {
        let mut guard = self.notified.lock();
        while !*guard {
            self.cv.wait(&mut guard);
        }
        *guard = false;
    }
}

impl Wake for ParkWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let mut guard = self.notified.lock();
        *guard = true;
        self.cv.notify_one();
    }
}

/// A multi-threaded runtime: a fixed pool of core workers driving the
/// reactor, and a fixed pool of blocking workers for synchronous offload.
///
/// Dropping an `Executor` stops both pools and joins every worker thread.
pub struct Executor {
    reactor: Arc<Reactor>,
    blocking: Arc<BlockingPool>,
    core_threads: Vec<thread::JoinHandle<()>>,
    blocking_threads: Vec<thread::JoinHandle<()>>,
}

impl Executor {
    /// Builds an executor with `core_workers` core threads and
    /// `blocking_workers` blocking threads.
    ///
    /// # Panics
    ///
    /// Panics if either count is zero — an executor that can never run
    /// anything, or never offload anything, is a construction bug rather
    /// than a recoverable error.
    pub fn new(core_workers: usize, blocking_workers: usize) -> Self {
        assert!(core_workers > 0, "an executor needs at least one core worker");
        assert!(
            blocking_workers > 0,
            "an executor needs at least one blocking worker"
        );

        let blocking = BlockingPool::new();
        let reactor = Reactor::new(blocking.clone());

        let core_threads = (0..core_workers)
            .map(|i| {
                let reactor = reactor.clone();
                thread::Builder::new()
                    .name(format!("corerun-core-{i}"))
                    .spawn(move || core_worker_loop(reactor))
                    .expect("failed to spawn core worker thread")
            })
            .collect();

        let blocking_threads = (0..blocking_workers)
            .map(|i| {
                let blocking = blocking.clone();
                let reactor = reactor.clone();
                thread::Builder::new()
                    .name(format!("corerun-blocking-{i}"))
                    .spawn(move || {
                        let _guard = ContextGuard::enter(reactor);
                        blocking.worker_loop();
                    })
                    .expect("failed to spawn blocking worker thread")
            })
            .collect();

        Self {
            reactor,
            blocking,
            core_threads,
            blocking_threads,
        }
    }

    /// Builds an executor sized to the number of available CPUs, for both
    /// the core and blocking pools.
    pub fn with_default_workers() -> Self {
        let n = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::new(n, n)
    }

    /// Spawns `future` onto the core pool, returning a handle to its
    /// eventual result.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (_, handle) = Harness::spawn(self.reactor.clone(), future, None);
        handle
    }

    /// Submits `f` to the blocking pool, returning a handle to its
    /// eventual result.
    pub fn spawn_blocking<F, T>(&self, f: F) -> BlockingJoinHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        submit_blocking(&self.blocking, f)
    }

    /// Runs `make()` and the future it returns to completion on the
    /// calling thread, entering this executor's context so the future may
    /// spawn tasks and use the synchronization primitives in this crate.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread is already inside an executor context
    /// (including this same executor's own worker threads).
    pub fn block_on<F, Fut>(&self, make: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let _guard = ContextGuard::enter(self.reactor.clone());
        let mut fut = Box::pin(make());
        let park = Arc::new(ParkWaker {
            notified: Mutex::new(false),
            cv: Condvar::new(),
        });
        let waker = Waker::from(park.clone());
        let mut cx = Context::from_waker(&waker);
        loop {
            match fut.as_mut().poll(&mut cx) {
                Poll::Ready(value) => return value,
                Poll::Pending => park.park(),
            }
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.blocking.shutdown();
        for handle in self.blocking_threads.drain(..) {
            let _ = handle.join();
        }
        self.reactor.stop();
        for handle in self.core_threads.drain(..) {
            let _ = handle.join();
        }
    }
}

fn core_worker_loop(reactor: Arc<Reactor>) {
    let _guard = ContextGuard::enter(reactor.clone());
    while !reactor.is_stopped() {
        match reactor.run_once() {
            RunOutcome::Ran => continue,
            RunOutcome::Idle { next_deadline } => reactor.park_for(next_deadline),
        }
    }
}

pub(crate) fn submit_blocking<F, T>(pool: &Arc<BlockingPool>, f: F) -> BlockingJoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let join = JoinInner::new();
    let handle = BlockingJoinHandle::new(join.clone());
    let job = BlockingJob {
        run: Box::new(move || {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
            match outcome {
                Ok(value) => join.complete(Ok(value)),
                Err(payload) => join.complete(Err(JoinError::panic(payload))),
            }
        }),
    };
    pool.submit(job);
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::util::SubscriberInitExt;

    #[test]
    fn block_on_returns_value() {
        let exec = Executor::new(2, 1);
        let result = exec.block_on(|| async { 1 + 1 });
        assert_eq!(result, 2);
    }

    #[test]
    fn spawn_runs_concurrently_with_block_on() {
        let _trace = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_thread_names(true)
            .set_default();
        let exec = Executor::new(2, 1);
        let counter = Arc::new(AtomicUsize::new(0));
        exec.block_on(|| {
            let counter = counter.clone();
            async move {
                let handles: Vec<_> = (0..100)
                    .map(|_| {
                        let counter = counter.clone();
                        exec_spawn_via_current(counter)
                    })
                    .collect();
                for h in handles {
                    h.await.unwrap();
                }
            }
        });
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    fn exec_spawn_via_current(counter: Arc<AtomicUsize>) -> JoinHandle<()> {
        crate::task::spawn(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn spawn_blocking_offloads_and_joins() {
        let exec = Executor::new(1, 2);
        let result = exec.block_on(|| async {
            exec_spawn_blocking_via_current(|| std::thread::current().name().is_some())
                .await
                .unwrap()
        });
        assert!(result);
    }

    fn exec_spawn_blocking_via_current<F, T>(f: F) -> BlockingJoinHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        crate::task::spawn_blocking(f)
    }

    #[test]
    fn join_handle_reports_panic() {
        let exec = Executor::new(1, 1);
        let result = exec.block_on(|| async {
            let handle = exec_spawn_via_current_panicking();
            handle.await
        });
        assert!(result.is_err());
        assert!(result.unwrap_err().is_panic());
    }

    fn exec_spawn_via_current_panicking() -> JoinHandle<()> {
        crate::task::spawn(async { panic!("boom") })
    }

    #[test]
    #[should_panic(expected = "nested")]
    fn nested_block_on_panics() {
        let exec = Executor::new(1, 1);
        exec.block_on(|| async {
            let inner = Executor::new(1, 1);
            inner.block_on(|| async {});
        });
    }
}
