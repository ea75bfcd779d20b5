use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use futures::channel::oneshot;
use http::{HeaderMap, header};
use http_body::Body;
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::buffer::{BlockChain, BlockPool};
use crate::codec::{HeaderEncoder, ResponseFramer};
use crate::connection::PipelineConfig;
use crate::connection::WriteHandle;
use crate::connection::flush::{CancelGuard, FlushJob, FlushState};
use crate::ensure;
use crate::executor::{Schedule, SerialQueue};
use crate::protocol::{FramingMode, OutputError, PayloadItem, ProtocolError, ResponseHead, has_transfer_encoding};
use crate::transport::Transport;

/// When the caller of a write gets control back relative to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    /// `write`: flush past the threshold, never wait
    Detached,
    /// `write_async`: flush past the threshold, wait only for that flush
    Threshold,
    /// `write_async_awaited`: always flush and wait for the transport
    Delivered,
}

/// The response output path of one connection.
///
/// `OutputPipeline` buffers application bytes in pooled blocks, frames them with
/// `Content-Length` or chunked encoding and hands them to a [`Transport`] through a
/// [`Schedule`] implementation, so no write ever blocks on the network.
///
/// One response moves through `Unset -> Content-Length | Chunked -> writing -> ended`.
/// The framing mode is chosen from the response headers on the first write (or on
/// [`OutputPipeline::produce_end`] for an empty body) and the headers are frozen from
/// then on.
///
/// Three write flavours share the same buffering and framing:
///
/// - [`write`](OutputPipeline::write) returns as soon as the bytes are buffered
/// - [`write_async`](OutputPipeline::write_async) waits for the flush it triggered, if any
/// - [`write_async_awaited`](OutputPipeline::write_async_awaited) always flushes and waits
///   for the transport to confirm
///
/// The pipeline has a single writer; it takes `&mut self` and does no locking of its own.
/// A transport failure is sticky: every later call fails with the same cause.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use http::header;
/// use micro_http_output::buffer::{BlockPool, PoolConfig};
/// use micro_http_output::connection::{OutputPipeline, PipelineConfig};
/// use micro_http_output::executor::SerialQueue;
/// use micro_http_output::transport::StreamTransport;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run(stream: tokio::net::TcpStream) -> Result<(), Box<dyn std::error::Error>> {
/// let transport = Arc::new(StreamTransport::new(stream));
/// let pool = BlockPool::new(PoolConfig::default());
/// let mut pipeline = OutputPipeline::new(transport, pool, SerialQueue::spawn(), PipelineConfig::default());
///
/// pipeline.headers_mut()?.insert(header::CONTENT_LENGTH, 5.into());
/// pipeline.write_async(b"hello", &CancellationToken::new()).await?;
/// pipeline.produce_end().await?;
/// # Ok(())
/// # }
/// ```
pub struct OutputPipeline<T, S = SerialQueue> {
    head: ResponseHead,
    framer: ResponseFramer,
    header_encoder: HeaderEncoder,
    chain: BlockChain,
    ended: bool,
    aborted: Option<OutputError>,
    config: PipelineConfig,
    transport: Arc<T>,
    scheduler: S,
    state: triomphe::Arc<FlushState>,
}

impl<T, S> OutputPipeline<T, S>
where
    T: Transport + Send + Sync + 'static,
    S: Schedule,
{
    pub fn new(transport: Arc<T>, pool: BlockPool, scheduler: S, config: PipelineConfig) -> Self {
        Self {
            head: ResponseHead::default(),
            framer: ResponseFramer::new(),
            header_encoder: HeaderEncoder,
            chain: BlockChain::new(pool),
            ended: false,
            aborted: None,
            config,
            transport,
            scheduler,
            state: triomphe::Arc::new(FlushState::default()),
        }
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// Gives access to status, version and headers until the first body byte is written.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::HeadersSent`] once the framing mode has been selected.
    pub fn head_mut(&mut self) -> Result<&mut ResponseHead, ProtocolError> {
        ensure!(!self.framer.is_selected(), ProtocolError::HeadersSent);
        Ok(&mut self.head)
    }

    /// Gives access to the response headers until the first body byte is written.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::HeadersSent`] once the framing mode has been selected.
    pub fn headers_mut(&mut self) -> Result<&mut HeaderMap, ProtocolError> {
        self.head_mut().map(ResponseHead::headers_mut)
    }

    pub fn mode(&self) -> FramingMode {
        self.framer.mode()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Framed bytes buffered and not yet handed to the transport.
    pub fn buffered_len(&self) -> usize {
        self.chain.len()
    }

    /// Payload bytes accepted so far, excluding framing.
    pub fn written(&self) -> u64 {
        self.framer.written()
    }

    /// Framed bytes the transport has confirmed as delivered.
    ///
    /// After a cancelled write or a transport failure this is the part of the response
    /// known to have gone out. The abandoned flush may have delivered a further prefix
    /// the transport never confirmed.
    pub fn flushed_bytes(&self) -> u64 {
        self.state.flushed()
    }

    /// Buffers `data` and returns without waiting on the transport.
    ///
    /// When the buffer reaches the flush threshold a flush is started in the background.
    /// Only validation errors surface here; a transport failure shows up on a later call.
    pub fn write(&mut self, data: &[u8]) -> Result<(), OutputError> {
        self.submit(data, Completion::Detached, None).map(drop)
    }

    /// Buffers `data`; the handle completes once the flush triggered by this write, if
    /// any, has been accepted by the transport.
    ///
    /// Cancelling `cancel` before that fails the handle with [`OutputError::Cancelled`]
    /// and keeps the not yet delivered bytes of this write off the wire.
    pub fn write_async(&mut self, data: &[u8], cancel: &CancellationToken) -> WriteHandle {
        self.submit_handle(data, Completion::Threshold, cancel)
    }

    /// Buffers `data`, flushes everything buffered and completes only when the
    /// transport reports the outcome, failures included.
    pub fn write_async_awaited(&mut self, data: &[u8], cancel: &CancellationToken) -> WriteHandle {
        self.submit_handle(data, Completion::Delivered, cancel)
    }

    /// Hands every buffered byte to the transport and completes when all flushes
    /// issued so far have finished.
    ///
    /// Fails with the transport failure of the connection, or with
    /// [`ProtocolError::Truncated`] once a cancelled write left the body incomplete.
    pub fn flush(&mut self) -> WriteHandle {
        if let Some(cause) = self.state.fault() {
            return WriteHandle::ready(Err(cause.into()));
        }
        if self.state.is_truncated() {
            return WriteHandle::ready(Err(ProtocolError::Truncated.into()));
        }
        WriteHandle::waiting(self.schedule_flush(None), None)
    }

    /// Finalizes the response.
    ///
    /// Selects the framing mode if no byte was written yet, emits the terminator the
    /// mode requires (`0\r\n\r\n` for chunked, nothing for `Content-Length`), flushes and
    /// completes once the transport accepted the final bytes.
    ///
    /// A `Content-Length` body that is still short is a protocol violation: the bytes
    /// accepted so far are still flushed, the response is ended and the handle fails.
    pub fn produce_end(&mut self) -> WriteHandle {
        match self.finish() {
            Ok(receiver) => WriteHandle::waiting(receiver, None),
            Err(e) => WriteHandle::ready(Err(e)),
        }
    }

    /// Streams `body` as the response body and finalizes the response.
    ///
    /// While the headers are still open and neither `Content-Length` nor
    /// `Transfer-Encoding` is set, an exact size hint of the body becomes the
    /// `Content-Length`.
    pub async fn send_body<B>(&mut self, mut body: B) -> Result<(), OutputError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Display,
    {
        if !self.framer.is_selected() {
            let headers = self.head.headers_mut();
            if !headers.contains_key(header::CONTENT_LENGTH)
                && !has_transfer_encoding(headers)
                && let Some(length) = body.size_hint().exact()
            {
                headers.insert(header::CONTENT_LENGTH, length.into());
            }
        }

        loop {
            match body.frame().await {
                Some(Ok(frame)) => {
                    let Ok(data) = frame.into_data() else {
                        trace!("skip non-data frame of response body");
                        continue;
                    };
                    if let Some(receiver) = self.submit(&data, Completion::Threshold, None)? {
                        WriteHandle::waiting(receiver, None).await?;
                    }
                }
                Some(Err(e)) => {
                    error!(cause = %e, "resolve response body error");
                    let error = ProtocolError::invalid_body(format!("resolve response body error: {e}"));
                    return Err(self.abort(error.into()));
                }
                None => return self.produce_end().await,
            }
        }
    }

    fn submit_handle(&mut self, data: &[u8], completion: Completion, cancel: &CancellationToken) -> WriteHandle {
        match self.submit(data, completion, Some(cancel)) {
            Ok(Some(receiver)) => WriteHandle::waiting(receiver, Some(cancel.clone())),
            Ok(None) => WriteHandle::ready(Ok(())),
            Err(e) => WriteHandle::ready(Err(e)),
        }
    }

    /// The buffering and framing path shared by every write flavour.
    fn submit(
        &mut self,
        data: &[u8],
        completion: Completion,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<oneshot::Receiver<Result<(), OutputError>>>, OutputError> {
        self.ensure_writable()?;
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(OutputError::Cancelled);
        }
        self.start_response()?;

        let from = self.chain.len();
        if let Err(e) = self.framer.encode(PayloadItem::Chunk(data), &mut self.chain) {
            return Err(self.abort(e));
        }

        let flush = match completion {
            Completion::Delivered => true,
            Completion::Detached | Completion::Threshold => self.chain.len() >= self.config.flush_threshold(),
        };
        if !flush {
            return Ok(None);
        }

        // a whole chunk can be dropped cleanly, a partial content-length body cannot
        let resumable = self.framer.mode().is_chunked();
        let guard = cancel.map(|token| CancelGuard { token: token.clone(), from, resumable });
        match completion {
            Completion::Detached => {
                self.schedule_detached();
                Ok(None)
            }
            Completion::Threshold | Completion::Delivered => Ok(Some(self.schedule_flush(guard))),
        }
    }

    fn finish(&mut self) -> Result<oneshot::Receiver<Result<(), OutputError>>, OutputError> {
        self.ensure_writable()?;
        self.start_response()?;
        self.ended = true;

        if let Err(e) = self.framer.encode(PayloadItem::<&[u8]>::Eof, &mut self.chain) {
            error!(cause = %e, "response finalized with an error");
            self.schedule_detached();
            return Err(self.abort(e));
        }

        debug!(mode = ?self.framer.mode(), written = self.framer.written(), "response finalized");
        Ok(self.schedule_flush(None))
    }

    fn ensure_writable(&self) -> Result<(), OutputError> {
        ensure!(!self.ended, ProtocolError::AlreadyEnded.into());
        if let Some(e) = &self.aborted {
            return Err(e.clone());
        }
        if let Some(cause) = self.state.fault() {
            return Err(cause.into());
        }
        ensure!(!self.state.is_truncated(), ProtocolError::Truncated.into());
        Ok(())
    }

    /// Selects the framing mode and, when configured, buffers the response head.
    fn start_response(&mut self) -> Result<(), OutputError> {
        if self.framer.is_selected() {
            return Ok(());
        }

        // a bad header leaves the mode unset so the caller can fix it
        self.framer.select(self.head.headers_mut())?;

        if self.config.emit_head()
            && let Err(e) = self.header_encoder.encode(&self.head, &mut self.chain)
        {
            return Err(self.abort(e));
        }
        Ok(())
    }

    fn abort(&mut self, e: OutputError) -> OutputError {
        if self.aborted.is_none() {
            self.aborted = Some(e.clone());
        }
        e
    }

    fn schedule_flush(&mut self, guard: Option<CancelGuard>) -> oneshot::Receiver<Result<(), OutputError>> {
        let (sender, receiver) = oneshot::channel();
        self.schedule(guard, Some(sender));
        receiver
    }

    fn schedule_detached(&mut self) {
        if !self.chain.is_empty() {
            self.schedule(None, None);
        }
    }

    fn schedule(&mut self, guard: Option<CancelGuard>, completion: Option<oneshot::Sender<Result<(), OutputError>>>) {
        trace!(bytes = self.chain.len(), blocks = self.chain.block_count(), "schedule flush");
        let blocks = self.chain.take();
        let job = FlushJob::new(Arc::clone(&self.transport), triomphe::Arc::clone(&self.state), blocks, guard, completion);
        self.scheduler.schedule(job.into_work());
    }
}

impl<T, S> std::fmt::Debug for OutputPipeline<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputPipeline")
            .field("mode", &self.framer.mode())
            .field("buffered", &self.chain.len())
            .field("ended", &self.ended)
            .field("aborted", &self.aborted)
            .field("config", &self.config)
            .finish()
    }
}
