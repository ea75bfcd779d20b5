use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use futures::channel::oneshot;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::buffer::PooledBlock;
use crate::ensure;
use crate::executor::{Work, panic_message};
use crate::protocol::{OutputError, ProtocolError};
use crate::transport::Transport;

pub(crate) type Completion = oneshot::Sender<Result<(), OutputError>>;

/// State shared between a pipeline and the flush jobs it scheduled.
#[derive(Debug, Default)]
pub(crate) struct FlushState {
    fault: OnceLock<Arc<io::Error>>,
    flushed: AtomicU64,
    truncated: AtomicBool,
}

impl FlushState {
    /// The first transport failure of the connection, if any.
    pub(crate) fn fault(&self) -> Option<Arc<io::Error>> {
        self.fault.get().cloned()
    }

    /// Records a transport failure. The first recorded cause wins and is returned.
    fn fail(&self, e: io::Error) -> Arc<io::Error> {
        let cause = Arc::new(e);
        let _ = self.fault.set(Arc::clone(&cause));
        self.fault.get().cloned().unwrap_or(cause)
    }

    pub(crate) fn flushed(&self) -> u64 {
        self.flushed.load(Ordering::Acquire)
    }

    pub(crate) fn is_truncated(&self) -> bool {
        self.truncated.load(Ordering::Acquire)
    }
}

/// The bytes of one cancellable write inside a flush job: everything from byte
/// `from` of the job onwards.
///
/// A `resumable` write can be dropped whole without corrupting the body, as long as none
/// of its bytes reached the transport yet.
#[derive(Debug)]
pub(crate) struct CancelGuard {
    pub(crate) token: CancellationToken,
    pub(crate) from: usize,
    pub(crate) resumable: bool,
}

/// One batch of blocks on its way to the transport.
///
/// Blocks are delivered oldest first. Each block goes back to the pool as soon as the
/// transport confirmed it; on failure or cancellation the undelivered blocks are
/// abandoned and go back as well.
pub(crate) struct FlushJob<T> {
    transport: Arc<T>,
    state: triomphe::Arc<FlushState>,
    blocks: Vec<PooledBlock>,
    guard: Option<CancelGuard>,
    completion: Option<Completion>,
}

impl<T> FlushJob<T>
where
    T: Transport + Send + Sync + 'static,
{
    pub(crate) fn new(
        transport: Arc<T>,
        state: triomphe::Arc<FlushState>,
        blocks: Vec<PooledBlock>,
        guard: Option<CancelGuard>,
        completion: Option<Completion>,
    ) -> Self {
        Self { transport, state, blocks, guard, completion }
    }

    pub(crate) fn into_work(self) -> Work {
        Box::pin(self.run())
    }

    async fn run(mut self) {
        let result = self.deliver().await;
        if let Some(completion) = self.completion.take() {
            // the caller may have stopped waiting
            let _ = completion.send(result);
        }
    }

    async fn deliver(&mut self) -> Result<(), OutputError> {
        let blocks = std::mem::take(&mut self.blocks);
        let mut offset = 0;
        let mut tail_sent = false;

        for block in blocks {
            self.ensure_open()?;

            let bytes = block.as_slice();
            let (head, tail) = match &self.guard {
                Some(guard) => bytes.split_at(guard.from.saturating_sub(offset).min(bytes.len())),
                None => (bytes, &[][..]),
            };
            offset += bytes.len();

            self.send(head).await?;
            if let Some(guard) = &self.guard {
                self.send_cancellable(tail, guard, tail_sent).await?;
                tail_sent |= !tail.is_empty();
            }
        }

        self.ensure_open()
    }

    /// Fails once the connection faulted or a cancelled write left a hole in the body;
    /// bytes sent after either would land at the wrong offset.
    fn ensure_open(&self) -> Result<(), OutputError> {
        if let Some(cause) = self.state.fault() {
            return Err(cause.into());
        }
        ensure!(!self.state.is_truncated(), ProtocolError::Truncated.into());
        Ok(())
    }

    async fn send(&self, buf: &[u8]) -> Result<(), OutputError> {
        if buf.is_empty() {
            return Ok(());
        }

        match guarded_flush(self.transport.as_ref(), buf).await {
            Ok(()) => {
                self.state.flushed.fetch_add(buf.len() as u64, Ordering::AcqRel);
                trace!(bytes = buf.len(), "flushed to transport");
                Ok(())
            }
            Err(e) => {
                error!(cause = %e, "transport flush failed, abort remaining output");
                Err(self.state.fail(e).into())
            }
        }
    }

    async fn send_cancellable(&self, buf: &[u8], guard: &CancelGuard, tail_sent: bool) -> Result<(), OutputError> {
        if buf.is_empty() {
            return Ok(());
        }

        if guard.token.is_cancelled() {
            return Err(self.drop_cancelled(buf.len(), guard.resumable && !tail_sent));
        }

        // cancellation wins over a transport that became ready in the meantime; the
        // transport may still have taken part of `buf` when the flush is abandoned
        select! {
            biased;
            () = guard.token.cancelled() => Err(self.drop_cancelled(buf.len(), false)),
            result = self.send(buf) => result,
        }
    }

    fn drop_cancelled(&self, dropped: usize, clean: bool) -> OutputError {
        if clean {
            debug!(dropped, "write cancelled before delivery, dropped whole");
        } else {
            warn!(dropped, "write cancelled during delivery, response body truncated");
            self.state.truncated.store(true, Ordering::Release);
        }
        OutputError::Cancelled
    }
}

async fn guarded_flush<T: Transport>(transport: &T, buf: &[u8]) -> io::Result<()> {
    match AssertUnwindSafe(transport.flush(buf)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(io::Error::other(format!("transport panicked: {}", panic_message(panic.as_ref())))),
    }
}
