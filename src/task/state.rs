//! The tri-state result cell shared between a completing task (or blocking
//! job) and the handle a caller uses to observe it.
//!
//! A result starts `Waiting`. Whichever side acts second — the producer
//! finishing, or the consumer polling/detaching — decides what happens
//! next, all serialized through the same mutex so there is never a race
//! between "deliver the result" and "nobody is listening, discard it".

use std::task::Waker;

use parking_lot::Mutex;

use crate::error::JoinError;

enum State<T> {
    Waiting(Option<Waker>),
    Done(Result<T, JoinError>),
    Detached,
}

pub(crate) struct JoinInner<T> {
    state: Mutex<State<T>>,
}

impl<T> JoinInner<T> {
    pub(crate) fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            state: Mutex::new(State::Waiting(None)),
        })
    }

    /// Called exactly once, by the producer, when the result is ready.
    pub(crate) fn complete(&self, result: Result<T, JoinError>) {
        let mut guard = self.state.lock();
        match std::mem::replace(&mut *guard, State::Done(result)) {
            State::Waiting(Some(waker)) => waker.wake(),
            State::Waiting(None) => {}
            State::Detached => *guard = State::Detached,
            State::Done(_) => unreachable!("a task result was delivered twice"),
        }
    }

    pub(crate) fn poll_join(
        &self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<T, JoinError>> {
        let mut guard = self.state.lock();
        match &mut *guard {
            State::Done(_) => {
                let State::Done(result) = std::mem::replace(&mut *guard, State::Detached) else {
                    unreachable!()
                };
                std::task::Poll::Ready(result)
            }
            State::Waiting(waker) => {
                *waker = Some(cx.waker().clone());
                std::task::Poll::Pending
            }
            State::Detached => {
                panic!("polled a handle that was already consumed or detached")
            }
        }
    }

    /// Called by the consumer to give up on the result without ever
    /// reading it (an explicit `detach()` call, or the handle being
    /// dropped). A harmless no-op if the result already arrived — the
    /// value is simply discarded.
    pub(crate) fn detach(&self) {
        let mut guard = self.state.lock();
        if !matches!(&*guard, State::Done(_)) {
            *guard = State::Detached;
        }
    }
}
