//! Group locks
//!
//! A [`GroupLock`] is the capability to enqueue a request into a named group. A lock
//! may be created "locked", in which case `submit_batch` for its group waits until it
//! is released.

mod lock;

pub use lock::{GroupLock, GroupLockBuilder};
