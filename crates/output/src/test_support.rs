//! Transports and helpers shared by the unit tests.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::buffer::{BlockPool, PoolConfig};
use crate::connection::{OutputPipeline, PipelineConfig};
use crate::executor::{Schedule, SerialQueue, Work};
use crate::transport::Transport;

/// A transport that records every flush and can be told to stall, fail or panic.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    received: Mutex<Vec<u8>>,
    calls: Mutex<Vec<Vec<u8>>>,
    attempts: AtomicUsize,
    delay: Option<Duration>,
    fail_on: Option<usize>,
    panic_on: Option<usize>,
    partial_fail_on: Option<usize>,
    gate: Option<Semaphore>,
    split: bool,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The flush attempt with this index fails with `BrokenPipe`, delivering nothing.
    pub(crate) fn fail_on(mut self, attempt: usize) -> Self {
        self.fail_on = Some(attempt);
        self
    }

    pub(crate) fn panic_on(mut self, attempt: usize) -> Self {
        self.panic_on = Some(attempt);
        self
    }

    /// The flush attempt with this index delivers the first half of its bytes, then
    /// fails with `BrokenPipe`.
    pub(crate) fn fail_partially_on(mut self, attempt: usize) -> Self {
        self.partial_fail_on = Some(attempt);
        self
    }

    /// Every flush waits for a permit handed out by [`RecordingTransport::release`].
    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Every flush delivers the first half of its bytes at once and waits for a permit
    /// before delivering the rest.
    pub(crate) fn split_gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self.split = true;
        self
    }

    pub(crate) fn release(&self, flushes: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(flushes);
        }
    }

    pub(crate) fn received(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> Vec<Vec<u8>> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, bytes: &[u8]) {
        self.received.lock().unwrap().extend_from_slice(bytes);
    }

    async fn pass_gate(&self) -> io::Result<()> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.map_err(io::Error::other)?.forget();
        }
        Ok(())
    }
}

impl Transport for RecordingTransport {
    async fn flush(&self, buf: &[u8]) -> io::Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let (first, rest) = buf.split_at(buf.len() / 2);

        if self.split {
            self.record(first);
        } else {
            self.pass_gate().await?;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_on == Some(attempt) {
            panic!("transport exploded on flush {attempt}");
        }
        if self.fail_on == Some(attempt) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"));
        }
        if self.partial_fail_on == Some(attempt) {
            self.record(first);
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away mid-write"));
        }

        if self.split {
            self.pass_gate().await?;
            self.record(rest);
        } else {
            self.record(buf);
        }
        self.calls.lock().unwrap().push(buf.to_vec());
        Ok(())
    }
}

/// A scheduler whose worker is gone: every item is dropped unrun.
#[derive(Debug, Default)]
pub(crate) struct DroppingScheduler;

impl Schedule for DroppingScheduler {
    fn schedule(&self, work: Work) {
        drop(work);
    }
}

pub(crate) fn pipeline(transport: &Arc<RecordingTransport>, config: PipelineConfig) -> OutputPipeline<RecordingTransport> {
    pipeline_with_pool(transport, BlockPool::new(PoolConfig::default()), config)
}

pub(crate) fn pipeline_with_pool(
    transport: &Arc<RecordingTransport>,
    pool: BlockPool,
    config: PipelineConfig,
) -> OutputPipeline<RecordingTransport> {
    OutputPipeline::new(Arc::clone(transport), pool, SerialQueue::spawn(), config)
}

/// Decodes a complete chunked body, checking the framing on the way.
pub(crate) fn dechunk(mut wire: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    loop {
        let line_end = wire.windows(2).position(|w| w == b"\r\n").expect("chunk size line");
        let size_line = std::str::from_utf8(&wire[..line_end]).unwrap();
        let size = usize::from_str_radix(size_line, 16).unwrap();
        wire = &wire[line_end + 2..];

        if size == 0 {
            assert_eq!(wire, b"\r\n", "terminator must close the body");
            return body;
        }

        body.extend_from_slice(&wire[..size]);
        assert_eq!(&wire[size..size + 2], b"\r\n");
        wire = &wire[size + 2..];
    }
}
