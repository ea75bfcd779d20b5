//! The boundary between the pipeline and the peer.
//!
//! The pipeline never writes to a socket itself; it hands finished blocks to a
//! [`Transport`] and waits, off the caller's task, for the transport to report the
//! bytes delivered or failed. A transport may complete at once, after a delay, or with
//! an error; the pipeline treats all three alike.
//!
//! - [`Transport`]: the `Send` flavour used by the pipeline
//! - [`LocalTransport`]: the same contract without the `Send` bound
//! - [`StreamTransport`]: a transport over any tokio [`AsyncWrite`](tokio::io::AsyncWrite)

use std::io;

mod stream;

pub use stream::StreamTransport;

/// Delivers framed response bytes to the peer.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Attempts to deliver all of `buf`.
    ///
    /// Completes successfully once the bytes were handed to the OS or network layer,
    /// or fails with the transport error (peer reset, broken pipe, timeout). A failed
    /// flush may have delivered a prefix of `buf`.
    async fn flush(&self, buf: &[u8]) -> io::Result<()>;
}
