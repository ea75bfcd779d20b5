use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Top-level error returned by every write and finalization call of the output pipeline.
///
/// The variants keep the four failure classes apart: an application that breaks the
/// HTTP framing rules gets [`OutputError::Protocol`], a peer that goes away gets
/// [`OutputError::Transport`], an exhausted buffer pool gets [`OutputError::Pool`] and an
/// explicitly cancelled write gets [`OutputError::Cancelled`].
///
/// The error is `Clone` so the first transport failure of a connection can be handed to
/// every write queued behind it.
#[derive(Debug, Clone, Error)]
pub enum OutputError {
    #[error("protocol violation: {source}")]
    Protocol {
        #[from]
        source: ProtocolError,
    },

    #[error("transport failure: {source}")]
    Transport { source: Arc<io::Error> },

    #[error("buffer pool error: {source}")]
    Pool {
        #[from]
        source: PoolError,
    },

    #[error("write cancelled")]
    Cancelled,

    #[error("scheduled work failed: {reason}")]
    Worker { reason: String },
}

impl OutputError {
    pub fn transport<E: Into<io::Error>>(e: E) -> Self {
        Self::Transport { source: Arc::new(e.into()) }
    }

    pub fn worker<S: ToString>(str: S) -> Self {
        Self::Worker { reason: str.to_string() }
    }

    #[inline]
    pub fn is_protocol(&self) -> bool {
        matches!(self, OutputError::Protocol { .. })
    }

    #[inline]
    pub fn is_transport(&self) -> bool {
        matches!(self, OutputError::Transport { .. })
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OutputError::Cancelled)
    }

    /// Returns the protocol violation behind this error, if any.
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            OutputError::Protocol { source } => Some(source),
            _ => None,
        }
    }
}

impl From<Arc<io::Error>> for OutputError {
    fn from(source: Arc<io::Error>) -> Self {
        Self::Transport { source }
    }
}

/// Violations of the HTTP/1.x framing rules. These point at a bug in the code driving the
/// pipeline, never at a network condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("response already ended")]
    AlreadyEnded,

    #[error("headers already sent")]
    HeadersSent,

    #[error("content-length {declared} exceeded: {written} bytes written, attempted to add {attempted}")]
    ContentLengthExceeded { declared: u64, written: u64, attempted: u64 },

    #[error("content-length {declared} not reached: only {written} bytes written")]
    ContentLengthShort { declared: u64, written: u64 },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("both content-length and transfer-encoding are set")]
    ConflictingFraming,

    #[error("unsupported transfer-encoding {value:?}, the last coding must be chunked")]
    UnsupportedTransferEncoding { value: String },

    #[error("unsupported http version: {version}")]
    UnsupportedVersion { version: String },

    #[error("payload written before a framing mode was selected")]
    FramingUnset,

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("response body truncated by a cancelled write")]
    Truncated,
}

impl ProtocolError {
    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }
}

/// Failures of the pooled buffer arena.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("out of memory allocating a {requested} byte block")]
    OutOfMemory { requested: usize },

    #[error("block limit {limit} reached")]
    Exhausted { limit: usize },

    #[error("block {slot} returned while not leased")]
    NotLeased { slot: usize },

    #[error("block returned to a pool it was not leased from")]
    ForeignBlock,
}
