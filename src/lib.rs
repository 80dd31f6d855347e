//! A small multi-threaded async task runtime.
//!
//! The runtime combines a cooperative scheduler (suspendable [`Future`]s
//! driven to completion across a fixed pool of core worker threads) with a
//! separate blocking-work offload pool, so that synchronous syscalls never
//! stall the reactor. See [`executor::Executor`] for the entry point.

pub mod error;
pub mod executor;
mod queue;
mod reactor;
pub mod stream;
pub mod sync;
pub mod task;
pub mod time;

pub mod io;

pub use error::JoinError;
pub use executor::Executor;
pub use task::blocking::BlockingJoinHandle;
pub use task::{JoinHandle, spawn, spawn_blocking, yield_now};
