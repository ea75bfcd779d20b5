use crate::buffer::FrameSink;
use crate::codec::body::chunked_encoder::ChunkedEncoder;
use crate::codec::body::length_encoder::LengthEncoder;
use crate::protocol::{FramingMode, OutputError, PayloadItem};
use bytes::Buf;

/// encode payload for response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// content-length payload
    Length(LengthEncoder),

    /// transfer-encoding chunked payload
    Chunked(ChunkedEncoder),
}

impl PayloadEncoder {
    /// create a chunked `PayloadEncoder`
    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedEncoder::new()) }
    }

    /// create a fixed length `PayloadEncoder`
    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthEncoder::new(size)) }
    }

    pub fn is_finish(&self) -> bool {
        match &self.kind {
            Kind::Length(encoder) => encoder.is_finish(),
            Kind::Chunked(encoder) => encoder.is_finish(),
        }
    }

    pub fn mode(&self) -> FramingMode {
        match &self.kind {
            Kind::Length(encoder) => FramingMode::ContentLength(encoder.declared()),
            Kind::Chunked(_) => FramingMode::Chunked,
        }
    }

    /// Payload bytes accepted so far, excluding framing overhead.
    pub fn written(&self) -> u64 {
        match &self.kind {
            Kind::Length(encoder) => encoder.declared() - encoder.remaining(),
            Kind::Chunked(encoder) => encoder.send_size(),
        }
    }

    pub fn encode<D: Buf, S: FrameSink>(&mut self, item: PayloadItem<D>, dst: &mut S) -> Result<(), OutputError> {
        match &mut self.kind {
            Kind::Length(encoder) => encoder.encode(item, dst),
            Kind::Chunked(encoder) => encoder.encode(item, dst),
        }
    }
}
