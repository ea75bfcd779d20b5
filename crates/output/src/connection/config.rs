use crate::buffer::DEFAULT_BLOCK_SIZE;

/// Buffered bytes that trigger an eager flush
pub const DEFAULT_FLUSH_THRESHOLD: usize = 2 * DEFAULT_BLOCK_SIZE;

/// Per-connection settings of an [`OutputPipeline`](crate::connection::OutputPipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    flush_threshold: usize,
    emit_head: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { flush_threshold: DEFAULT_FLUSH_THRESHOLD, emit_head: false }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Once this many framed bytes are buffered, `write` and `write_async` hand them to
    /// the transport instead of buffering further. `0` flushes on every write.
    pub fn with_flush_threshold(mut self, flush_threshold: usize) -> Self {
        self.flush_threshold = flush_threshold;
        self
    }

    /// Write the status line and header block ahead of the body. Leave this off when an
    /// outer layer writes the head.
    pub fn with_emit_head(mut self, emit_head: bool) -> Self {
        self.emit_head = emit_head;
        self
    }

    #[inline]
    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }

    #[inline]
    pub fn emit_head(&self) -> bool {
        self.emit_head
    }
}
