//! Async-aware synchronization primitives.
//!
//! These mirror the blocking primitives in `std::sync`, but their `lock`/
//! `wait` operations are `async fn`s: a task that cannot immediately
//! acquire a lock parks itself and yields the worker thread back to the
//! reactor instead of blocking it.

mod condvar;
mod mutex;
mod multi_lock;
mod shared_mutex;

pub use condvar::CondVar;
pub use mutex::{Mutex, MutexGuard};
pub use multi_lock::lock_all;
pub use shared_mutex::{SharedMutex, SharedMutexReadGuard, SharedMutexWriteGuard};
