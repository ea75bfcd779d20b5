use crate::buffer::FrameSink;
use crate::ensure;
use crate::protocol::{OutputError, PayloadItem, ProtocolError};
use bytes::Buf;
use tracing::warn;

/// Emits payload bytes verbatim while holding the total to the declared
/// `Content-Length`.
///
/// A chunk that would overrun the declared length is rejected before any of its bytes
/// are written; finishing short of the declared length is rejected as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    declared: u64,
    length: u64,
    eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { declared: length, length, eof: false }
    }

    /// The declared `Content-Length`.
    pub fn declared(&self) -> u64 {
        self.declared
    }

    /// Bytes still owed to the peer.
    pub fn remaining(&self) -> u64 {
        self.length
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }

    pub fn encode<D: Buf, S: FrameSink>(&mut self, item: PayloadItem<D>, dst: &mut S) -> Result<(), OutputError> {
        match item {
            PayloadItem::Chunk(mut bytes) => {
                ensure!(!self.eof, ProtocolError::AlreadyEnded.into());
                if !bytes.has_remaining() {
                    return Ok(());
                }

                let size = bytes.remaining() as u64;
                if size > self.length {
                    warn!(declared = self.declared, attempted = size, "content-length overrun rejected");
                    return Err(ProtocolError::ContentLengthExceeded {
                        declared: self.declared,
                        written: self.declared - self.length,
                        attempted: size,
                    }
                    .into());
                }

                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let n = chunk.len();
                    dst.put_slice(chunk)?;
                    bytes.advance(n);
                }
                self.length -= size;
                Ok(())
            }
            PayloadItem::Eof => {
                if self.length != 0 {
                    return Err(ProtocolError::ContentLengthShort { declared: self.declared, written: self.declared - self.length }.into());
                }
                self.eof = true;
                Ok(())
            }
        }
    }
}
