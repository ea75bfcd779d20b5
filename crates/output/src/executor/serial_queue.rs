use std::panic::AssertUnwindSafe;

use futures::channel::mpsc;
use futures::{FutureExt, StreamExt};
use tokio::runtime::Handle;
use tracing::{error, trace};

use crate::executor::{Schedule, Work};

/// A FIFO work queue drained by one tokio task.
///
/// Scheduling pushes onto an unbounded channel and never waits. The worker task polls
/// one item to completion before starting the next, so items run strictly in submission
/// order. A panic inside an item is caught and logged; the queue keeps going.
///
/// The worker exits once every `SerialQueue` handle is dropped and the backlog is drained.
#[derive(Debug, Clone)]
pub struct SerialQueue {
    sender: mpsc::UnboundedSender<Work>,
}

impl SerialQueue {
    /// Starts a queue on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn() -> Self {
        Self::spawn_on(&Handle::current())
    }

    /// Starts a queue on the given runtime.
    pub fn spawn_on(handle: &Handle) -> Self {
        let (sender, receiver) = mpsc::unbounded();
        handle.spawn(run(receiver));
        Self { sender }
    }

    /// Returns true once the worker task has stopped accepting work.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl Schedule for SerialQueue {
    fn schedule(&self, work: Work) {
        if let Err(e) = self.sender.unbounded_send(work) {
            // dropping the work drops its completion, the waiting caller sees the failure
            error!(cause = %e, "serial queue worker has stopped, work dropped");
        }
    }
}

async fn run(mut receiver: mpsc::UnboundedReceiver<Work>) {
    while let Some(work) = receiver.next().await {
        if let Err(panic) = AssertUnwindSafe(work).catch_unwind().await {
            error!(cause = panic_message(panic.as_ref()), "scheduled work panicked");
        }
    }
    trace!("serial queue drained, worker exit");
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_runs_in_submission_order() {
        let queue = SerialQueue::spawn();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10u64 {
            let seen = Arc::clone(&seen);
            queue.schedule(Box::pin(async move {
                // later items finish faster, order must still hold
                tokio::time::sleep(Duration::from_millis(10 - i)).await;
                seen.lock().unwrap().push(i);
            }));
        }

        let (tx, rx) = oneshot::channel();
        queue.schedule(Box::pin(async move {
            let _ = tx.send(());
        }));
        rx.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_panic_does_not_stop_queue() {
        let queue = SerialQueue::spawn();

        let (dropped_tx, dropped_rx) = oneshot::channel::<()>();
        queue.schedule(Box::pin(async move {
            let _keep = dropped_tx;
            panic!("boom");
        }));

        let (tx, rx) = oneshot::channel();
        queue.schedule(Box::pin(async move {
            let _ = tx.send(42);
        }));

        // the panicking item dropped its sender
        assert!(dropped_rx.await.is_err());
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[test]
    fn test_schedule_after_runtime_shutdown() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let queue = SerialQueue::spawn_on(runtime.handle());
        drop(runtime);

        let (tx, mut rx) = oneshot::channel::<()>();
        queue.schedule(Box::pin(async move {
            let _ = tx.send(());
        }));

        assert!(queue.is_closed());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_panic_message() {
        let panic: Box<dyn std::any::Any + Send> = Box::new("static message");
        assert_eq!(panic_message(panic.as_ref()), "static message");

        let panic: Box<dyn std::any::Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(panic.as_ref()), "owned message");

        let panic: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(panic.as_ref()), "unknown panic");
    }
}
