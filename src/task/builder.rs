//! Optional task metadata attached before spawning.

use std::future::Future;
use std::sync::Arc;

use crate::reactor::{self, Reactor};
use crate::task::harness::Harness;
use crate::task::id::Id;
use crate::task::join_handle::JoinHandle;

/// Builds a task with an attached name before spawning it.
///
/// The name shows up in the task's tracing span; it has no effect on
/// scheduling.
#[derive(Default)]
pub struct TaskBuilder<'a> {
    name: Option<&'a str>,
}

impl<'a> TaskBuilder<'a> {
    pub fn new() -> Self {
        Self { name: None }
    }

    pub fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Spawns `future` onto the executor context the calling code is
    /// currently running inside, with the name attached to this builder.
    ///
    /// # Panics
    ///
    /// Panics if called outside of an executor context.
    pub fn spawn<F>(self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (_, handle) = self.spawn_on(reactor::current(), future);
        handle
    }

    pub(crate) fn spawn_on<F>(self, reactor: Arc<Reactor>, future: F) -> (Id, JoinHandle<F::Output>)
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        Harness::spawn(reactor, future, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Executor;

    #[test]
    fn named_task_runs_to_completion() {
        let exec = Executor::new(1, 1);
        let result = exec.block_on(|| async {
            TaskBuilder::new().name("greeter").spawn(async { 42 }).await
        });
        assert_eq!(result.unwrap(), 42);
    }
}
