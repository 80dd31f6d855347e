//! The reactor: the run queue and timer wheel shared by every core worker
//! of an [`Executor`](crate::Executor).
//!
//! A reactor owns two things: a lock-free queue of tasks that are ready to
//! be polled, and a min-heap of pending deadlines. `run_once` drains one
//! unit of work — either a ready task or an expired timer — and reports
//! back whether it did anything, so a worker knows whether to keep spinning
//! or go park.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::queue::Queue;
use crate::task::harness::TaskRef;
use crate::time::timer::TimerWheel;

thread_local! {
    static CURRENT: std::cell::RefCell<Option<Arc<Reactor>>> = const { std::cell::RefCell::new(None) };
}

/// RAII guard installing `reactor` as the current thread's executor context.
///
/// Only one executor may be active on a given thread at a time; attempting
/// to enter a second one while the first is still active is a programmer
/// error and panics immediately, mirroring how spawning or sleeping outside
/// of any executor context panics.
pub(crate) struct ContextGuard;

impl ContextGuard {
    pub(crate) fn enter(reactor: Arc<Reactor>) -> Self {
        CURRENT.with(|c| {
            let mut c = c.borrow_mut();
            assert!(
                c.is_none(),
                "attempted to enter an executor context while already inside one \
                 (nested executors are not supported)"
            );
            *c = Some(reactor);
        });
        ContextGuard
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT.with(|c| *c.borrow_mut() = None);
    }
}

/// Returns the reactor for the executor context the calling thread is
/// currently inside, if any.
pub(crate) fn try_current() -> Option<Arc<Reactor>> {
    CURRENT.with(|c| c.borrow().clone())
}

/// Returns the reactor for the executor context the calling thread is
/// currently inside.
///
/// # Panics
///
/// Panics if the calling thread is not a worker thread of, or inside a
/// `block_on` call on, some [`Executor`](crate::Executor).
pub(crate) fn current() -> Arc<Reactor> {
    try_current().expect(
        "called outside of an executor context: spawn, sleep, and the sync \
         primitives in this crate may only be used from within an executor",
    )
}

/// What a single call to [`Reactor::run_once`] accomplished.
pub(crate) enum RunOutcome {
    /// A ready task was polled, or an expired timer was fired.
    Ran,
    /// Nothing was ready. Carries the next known deadline, if any, so the
    /// caller knows how long it may safely park for.
    Idle { next_deadline: Option<Instant> },
}

pub(crate) struct Reactor {
    run_queue: Queue<TaskRef>,
    timers: Mutex<TimerWheel>,
    work_lock: Mutex<()>,
    work_cv: Condvar,
    stopped: std::sync::atomic::AtomicBool,
    pub(crate) blocking: Arc<crate::executor::BlockingPool>,
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("run_queue_len", &self.run_queue.len())
            .field("timers", &self.timers)
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl Reactor {
    pub(crate) fn new(blocking: Arc<crate::executor::BlockingPool>) -> Arc<Self> {
        Arc::new(Self {
            run_queue: Queue::new(),
            timers: Mutex::new(TimerWheel::new()),
            work_lock: Mutex::new(()),
            work_cv: Condvar::new(),
            stopped: std::sync::atomic::AtomicBool::new(false),
            blocking,
        })
    }

    /// Pushes a ready task onto the run queue and wakes one idle worker.
    ///
    /// Pushing to the queue and taking the work lock are two separate
    /// steps; the lock is only there to synchronize with a waiter's
    /// check-then-park sequence in [`Reactor::park_for`], not to guard the
    /// queue itself.
    pub(crate) fn schedule(&self, task: TaskRef) {
        self.run_queue.push(task);
        let _guard = self.work_lock.lock();
        self.work_cv.notify_all();
    }

    pub(crate) fn register_timer(&self, deadline: Instant) -> (u64, Arc<crate::io::Bridge>) {
        let (id, bridge) = self.timers.lock().register(deadline);
        let _guard = self.work_lock.lock();
        self.work_cv.notify_all();
        (id, bridge)
    }

    pub(crate) fn cancel_timer(&self, id: u64) {
        self.timers.lock().cancel(id);
    }

    pub(crate) fn run_once(&self) -> RunOutcome {
        if let Some(task) = self.run_queue.pop() {
            task.run();
            return RunOutcome::Ran;
        }
        let fired = self.timers.lock().turn(Instant::now());
        if fired > 0 {
            return RunOutcome::Ran;
        }
        RunOutcome::Idle {
            next_deadline: self.timers.lock().next_deadline(),
        }
    }

    /// Parks the calling worker until there is a reason to re-check
    /// `run_once`: new work was scheduled, a deadline passed, or the
    /// reactor was stopped.
    pub(crate) fn park_for(&self, next_deadline: Option<Instant>) {
        let mut guard = self.work_lock.lock();
        if !self.run_queue.is_empty() || self.is_stopped() {
            return;
        }
        match next_deadline {
            Some(deadline) => {
                let now = Instant::now();
                if deadline > now {
                    self.work_cv.wait_for(&mut guard, deadline - now);
                }
            }
            None => {
                // Bound the wait even with no known deadline so a timer
                // registered concurrently (and missed by the emptiness
                // check above) is not waited on forever.
                self.work_cv.wait_for(&mut guard, Duration::from_millis(50));
            }
        }
    }

    pub(crate) fn stop(&self) {
        self.stopped.store(true, std::sync::atomic::Ordering::Release);
        let _guard = self.work_lock.lock();
        self.work_cv.notify_all();
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(std::sync::atomic::Ordering::Acquire)
    }
}
