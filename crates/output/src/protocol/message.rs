use bytes::{Buf, Bytes};

/// Represents an item in the HTTP response payload stream.
///
/// Application writes enter the framer as [`PayloadItem::Chunk`]; finalizing the
/// response feeds a single [`PayloadItem::Eof`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A chunk of payload data
    Chunk(Data),
    /// Marks the end of the payload stream
    Eof,
}

/// How the body of one response is delimited on the wire.
///
/// A response starts out `Unset` and moves to exactly one of the other two variants
/// when the first body byte is written or the response is finalized. The selected mode
/// never changes afterwards.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum FramingMode {
    /// No body byte has been produced yet
    #[default]
    Unset,
    /// Payload with a declared length in bytes, emitted verbatim
    ContentLength(u64),
    /// Payload using chunked transfer encoding
    Chunked,
}

impl FramingMode {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, FramingMode::Chunked)
    }
}
