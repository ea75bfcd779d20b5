//! HTTP response head serialization.
//!
//! Writes the status line and header block of a [`ResponseHead`] ahead of the first
//! body byte. The framing headers (`Content-Length` or `Transfer-Encoding`) must already
//! agree with the selected [`FramingMode`](crate::protocol::FramingMode); the
//! [`ResponseFramer`](crate::codec::ResponseFramer) takes care of that when it selects the mode.

use crate::buffer::FrameSink;
use crate::protocol::{OutputError, ProtocolError, ResponseHead};

use http::Version;
use tracing::error;

/// Encoder for HTTP/1.1 response heads.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderEncoder;

impl HeaderEncoder {
    /// Encodes `head` into `dst`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - HTTP version is not supported (only HTTP/1.1 supported)
    /// - the buffer pool cannot provide room for the head
    pub fn encode<S: FrameSink>(&mut self, head: &ResponseHead, dst: &mut S) -> Result<(), OutputError> {
        match head.version() {
            Version::HTTP_11 => {
                let status = head.status();
                dst.put_slice(b"HTTP/1.1 ")?;
                dst.put_slice(status.as_str().as_bytes())?;
                dst.put_slice(b" ")?;
                dst.put_slice(status.canonical_reason().unwrap_or_default().as_bytes())?;
                dst.put_slice(b"\r\n")?;
            }
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(ProtocolError::UnsupportedVersion { version: format!("{v:?}") }.into());
            }
        }

        for (header_name, header_value) in head.headers() {
            dst.put_slice(header_name.as_ref())?;
            dst.put_slice(b": ")?;
            dst.put_slice(header_value.as_ref())?;
            dst.put_slice(b"\r\n")?;
        }
        dst.put_slice(b"\r\n")?;
        Ok(())
    }
}
