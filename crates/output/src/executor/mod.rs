//! Deferred execution of flush work.
//!
//! Flushes and their completion continuations never run on the task that issued the
//! write. They are handed to a [`Schedule`] implementation, which runs each item exactly
//! once and in submission order. [`SerialQueue`] is the tokio-backed implementation; one
//! queue serves one connection, so connections never wait on each other.

use futures::future::BoxFuture;

mod serial_queue;

pub use serial_queue::SerialQueue;
pub(crate) use serial_queue::panic_message;

/// A unit of deferred work.
pub type Work = BoxFuture<'static, ()>;

/// Runs deferred work without blocking the caller.
///
/// Implementations must run every scheduled item exactly once and must run the items
/// of one instance in the order they were scheduled.
pub trait Schedule {
    fn schedule(&self, work: Work);
}

impl<S: Schedule + ?Sized> Schedule for std::sync::Arc<S> {
    fn schedule(&self, work: Work) {
        (**self).schedule(work);
    }
}
