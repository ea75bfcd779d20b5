use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::BoxFuture;
use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::protocol::OutputError;

/// Completion of a write, flush or finalization call.
///
/// The bytes were already buffered and, if needed, scheduled for delivery by the time
/// the handle is returned; awaiting it only observes the outcome. Dropping the handle
/// does not cancel anything.
///
/// A handle waiting on a cancellable write resolves to [`OutputError::Cancelled`] as soon
/// as the token fires, even while the flush job is still stuck behind earlier bytes. The
/// job checks the same token before and while sending the write's bytes, so none of them
/// are handed to the transport after that.
pub struct WriteHandle {
    state: HandleState,
}

enum HandleState {
    Ready(Option<Result<(), OutputError>>),
    Waiting(BoxFuture<'static, Result<(), OutputError>>),
}

impl WriteHandle {
    pub(crate) fn ready(result: Result<(), OutputError>) -> Self {
        Self { state: HandleState::Ready(Some(result)) }
    }

    pub(crate) fn waiting(receiver: oneshot::Receiver<Result<(), OutputError>>, cancel: Option<CancellationToken>) -> Self {
        Self { state: HandleState::Waiting(Box::pin(wait_for(receiver, cancel))) }
    }

    /// Returns true when the outcome was known without waiting on the transport.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, HandleState::Ready(_))
    }
}

impl Future for WriteHandle {
    type Output = Result<(), OutputError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            HandleState::Ready(result) => Poll::Ready(result.take().unwrap_or(Ok(()))),
            HandleState::Waiting(future) => future.as_mut().poll(cx),
        }
    }
}

impl fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            HandleState::Ready(result) => f.debug_tuple("WriteHandle::Ready").field(result).finish(),
            HandleState::Waiting(_) => f.write_str("WriteHandle::Waiting"),
        }
    }
}

async fn wait_for(
    receiver: oneshot::Receiver<Result<(), OutputError>>,
    cancel: Option<CancellationToken>,
) -> Result<(), OutputError> {
    let outcome = match cancel {
        Some(token) => select! {
            biased;
            outcome = receiver => outcome,
            () = token.cancelled() => return Err(OutputError::Cancelled),
        },
        None => receiver.await,
    };

    outcome.unwrap_or_else(|_| Err(OutputError::worker("flush work dropped before completing")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_handle() {
        let handle = WriteHandle::ready(Ok(()));
        assert!(handle.is_ready());
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_waits_for_completion() {
        let (tx, rx) = oneshot::channel();
        let handle = WriteHandle::waiting(rx, None);
        assert!(!handle.is_ready());

        tx.send(Err(OutputError::Cancelled)).unwrap();
        assert!(handle.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_completion_is_worker_error() {
        let (tx, rx) = oneshot::channel::<Result<(), OutputError>>();
        drop(tx);

        let error = WriteHandle::waiting(rx, None).await.unwrap_err();
        assert!(matches!(error, OutputError::Worker { .. }));
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let (_tx, rx) = oneshot::channel();
        let token = CancellationToken::new();
        let handle = WriteHandle::waiting(rx, Some(token.clone()));

        token.cancel();
        assert!(handle.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_completion_wins_over_late_cancel() {
        let (tx, rx) = oneshot::channel();
        let token = CancellationToken::new();
        tx.send(Ok(())).unwrap();
        token.cancel();

        assert!(WriteHandle::waiting(rx, Some(token)).await.is_ok());
    }
}
