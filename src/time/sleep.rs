use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use crate::io::Bridge;
use crate::reactor::{self, Reactor};

/// A future that resolves once a given instant has passed.
///
/// Dropping a `Sleep` before it resolves cancels the pending timer
/// registration; no waker is ever invoked for a cancelled sleep.
pub struct Sleep {
    deadline: Instant,
    registration: Option<(Arc<Reactor>, u64, Arc<Bridge>)>,
}

impl Sleep {
    /// The instant this sleep will resolve at.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if let Some((_, _, bridge)) = &self.registration {
            if bridge.is_ready() {
                return Poll::Ready(());
            }
            bridge.park(cx.waker().clone());
            return if bridge.is_ready() {
                Poll::Ready(())
            } else {
                Poll::Pending
            };
        }

        if Instant::now() >= self.deadline {
            return Poll::Ready(());
        }

        let reactor = reactor::current();
        let (id, bridge) = reactor.register_timer(self.deadline);
        bridge.park(cx.waker().clone());
        let ready = bridge.is_ready();
        self.registration = Some((reactor, id, bridge));
        if ready { Poll::Ready(()) } else { Poll::Pending }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some((reactor, id, _)) = &self.registration {
            reactor.cancel_timer(*id);
        }
    }
}

/// Returns a future that resolves once `duration` has elapsed.
///
/// # Panics
///
/// Panics if called outside of an executor context.
pub fn sleep_for(duration: Duration) -> Sleep {
    sleep_until(Instant::now() + duration)
}

/// Returns a future that resolves once `deadline` has passed.
///
/// # Panics
///
/// Panics if called outside of an executor context.
pub fn sleep_until(deadline: Instant) -> Sleep {
    // Eagerly validate the executor context so misuse panics at the call
    // site rather than on first poll.
    reactor::current();
    Sleep {
        deadline,
        registration: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Executor;

    #[test]
    fn sleep_resolves_after_deadline() {
        let exec = Executor::new(1, 1);
        let start = Instant::now();
        exec.block_on(|| async move {
            sleep_for(Duration::from_millis(15)).await;
        });
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    #[should_panic(expected = "executor context")]
    fn sleep_outside_executor_panics() {
        let _ = sleep_for(Duration::from_millis(1));
    }
}
