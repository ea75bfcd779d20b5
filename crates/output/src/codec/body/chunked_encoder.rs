use crate::buffer::FrameSink;
use crate::ensure;
use crate::protocol::{OutputError, PayloadItem, ProtocolError};
use bytes::Buf;

/// Encodes payload items with chunked transfer encoding.
///
/// Each non-empty chunk becomes `<HEX-LEN>\r\n<bytes>\r\n`; the end of the payload is
/// the single terminator `0\r\n\r\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEncoder {
    eof: bool,
    send_size: u64,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { eof: false, send_size: 0 }
    }

    /// Payload bytes written so far, not counting chunk framing.
    pub fn send_size(&self) -> u64 {
        self.send_size
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }

    pub fn encode<D: Buf, S: FrameSink>(&mut self, item: PayloadItem<D>, dst: &mut S) -> Result<(), OutputError> {
        match item {
            PayloadItem::Chunk(mut bytes) => {
                ensure!(!self.eof, ProtocolError::AlreadyEnded.into());

                let size = bytes.remaining();
                // a zero sized chunk would end the stream early
                if size == 0 {
                    return Ok(());
                }

                let mut line = [0u8; SIZE_LINE_MAX];
                dst.put_slice(helper::size_line(size, &mut line))?;
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let n = chunk.len();
                    dst.put_slice(chunk)?;
                    bytes.advance(n);
                }
                dst.put_slice(b"\r\n")?;
                self.send_size += size as u64;
                Ok(())
            }
            PayloadItem::Eof => {
                if self.eof {
                    return Ok(());
                }
                self.eof = true;
                dst.put_slice(b"0\r\n\r\n")?;
                Ok(())
            }
        }
    }
}

impl Default for ChunkedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// 16 hex digits for a 64 bit size plus CRLF
const SIZE_LINE_MAX: usize = 18;

mod helper {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    /// Formats `size` as upper-case hex followed by CRLF into `buf`.
    pub fn size_line(mut size: usize, buf: &mut [u8; super::SIZE_LINE_MAX]) -> &[u8] {
        let mut start = buf.len() - 2;
        buf[start] = b'\r';
        buf[start + 1] = b'\n';
        loop {
            start -= 1;
            buf[start] = HEX[size & 0xF];
            size >>= 4;
            if size == 0 {
                break;
            }
        }
        &buf[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = Vec::new();

        encoder.encode(PayloadItem::Chunk(&b"a"[..]), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(&b"bc"[..]), &mut dst).unwrap();
        encoder.encode(PayloadItem::<&[u8]>::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"1\r\na\r\n2\r\nbc\r\n0\r\n\r\n");
        assert_eq!(encoder.send_size(), 3);
        assert!(encoder.is_finish());
    }

    #[test]
    fn test_hex_size_line() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = Vec::new();

        let payload = vec![b'z'; 1024];
        encoder.encode(PayloadItem::Chunk(&payload[..]), &mut dst).unwrap();

        assert!(dst.starts_with(b"400\r\n"));
        assert!(dst.ends_with(b"z\r\n"));
        assert_eq!(dst.len(), 5 + 1024 + 2);

        let mut line = [0u8; SIZE_LINE_MAX];
        assert_eq!(helper::size_line(0xABCDEF, &mut line), b"ABCDEF\r\n");
        assert_eq!(helper::size_line(usize::MAX, &mut line).len(), 2 * size_of::<usize>() + 2);
    }

    #[test]
    fn test_empty_chunk_emits_nothing() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = Vec::new();

        encoder.encode(PayloadItem::Chunk(&b""[..]), &mut dst).unwrap();
        assert!(dst.is_empty());
        assert!(!encoder.is_finish());
    }

    #[test]
    fn test_terminator_emitted_once() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = Vec::new();

        encoder.encode(PayloadItem::<&[u8]>::Eof, &mut dst).unwrap();
        encoder.encode(PayloadItem::<&[u8]>::Eof, &mut dst).unwrap();
        assert_eq!(&dst[..], b"0\r\n\r\n");
    }

    #[test]
    fn test_chunk_after_eof_rejected() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = Vec::new();

        encoder.encode(PayloadItem::<&[u8]>::Eof, &mut dst).unwrap();
        let error = encoder.encode(PayloadItem::Chunk(&b"late"[..]), &mut dst).unwrap_err();
        assert_eq!(error.as_protocol(), Some(&ProtocolError::AlreadyEnded));
        assert_eq!(&dst[..], b"0\r\n\r\n");
    }

    #[test]
    fn test_non_contiguous_buf() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = Vec::new();

        let data = (&b"hello"[..]).chain(&b", world"[..]);
        encoder.encode(PayloadItem::Chunk(data), &mut dst).unwrap();
        assert_eq!(&dst[..], b"C\r\nhello, world\r\n");
    }
}
