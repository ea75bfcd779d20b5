use crate::buffer::FrameSink;
use crate::codec::body::PayloadEncoder;
use crate::protocol::{FramingMode, OutputError, PayloadItem, ProtocolError, declared_content_length, has_transfer_encoding};
use bytes::Buf;
use http::{HeaderMap, HeaderValue, header};
use tracing::{debug, error};

/// Turns application bytes into the wire body of one response.
///
/// The framer starts with no mode. [`ResponseFramer::select`] inspects the response
/// headers once: an explicit `Content-Length` selects fixed-length framing, anything
/// else selects chunked framing. After that every payload item goes through the
/// selected [`PayloadEncoder`].
#[derive(Debug, Default)]
pub struct ResponseFramer {
    payload_encoder: Option<PayloadEncoder>,
}

impl ResponseFramer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn mode(&self) -> FramingMode {
        self.payload_encoder.as_ref().map_or(FramingMode::Unset, PayloadEncoder::mode)
    }

    #[inline]
    pub fn is_selected(&self) -> bool {
        self.payload_encoder.is_some()
    }

    /// Payload bytes accepted so far, excluding framing overhead.
    pub fn written(&self) -> u64 {
        self.payload_encoder.as_ref().map_or(0, PayloadEncoder::written)
    }

    pub fn is_finish(&self) -> bool {
        self.payload_encoder.as_ref().is_some_and(PayloadEncoder::is_finish)
    }

    /// Selects the framing mode from `headers`.
    ///
    /// Selection happens once; later calls return the mode already chosen. Choosing
    /// chunked framing adds `transfer-encoding: chunked` when the header is missing.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidContentLength`] when `Content-Length` does not parse
    /// - [`ProtocolError::ConflictingFraming`] when both `Content-Length` and `Transfer-Encoding` are set
    /// - [`ProtocolError::UnsupportedTransferEncoding`] when `Transfer-Encoding` does not end with `chunked`
    pub fn select(&mut self, headers: &mut HeaderMap) -> Result<FramingMode, ProtocolError> {
        if let Some(encoder) = &self.payload_encoder {
            return Ok(encoder.mode());
        }

        let encoder = match (declared_content_length(headers)?, has_transfer_encoding(headers)) {
            (Some(_), true) => return Err(ProtocolError::ConflictingFraming),
            (Some(length), false) => PayloadEncoder::fix_length(length),
            (None, true) => {
                ensure_chunked_last(headers)?;
                PayloadEncoder::chunked()
            }
            (None, false) => {
                headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
                PayloadEncoder::chunked()
            }
        };

        let mode = encoder.mode();
        debug!(?mode, "framing mode selected");
        self.payload_encoder = Some(encoder);
        Ok(mode)
    }

    pub fn encode<D: Buf, S: FrameSink>(&mut self, item: PayloadItem<D>, dst: &mut S) -> Result<(), OutputError> {
        let Some(payload_encoder) = &mut self.payload_encoder else {
            error!("expect framing mode but receive payload item");
            return Err(ProtocolError::FramingUnset.into());
        };

        payload_encoder.encode(item, dst)
    }
}

fn ensure_chunked_last(headers: &HeaderMap) -> Result<(), ProtocolError> {
    let value = headers.get_all(header::TRANSFER_ENCODING).iter().last();
    let last_coding = value.and_then(|v| v.to_str().ok()).and_then(|v| v.rsplit(',').next()).map(str::trim);

    match last_coding {
        Some(coding) if coding.eq_ignore_ascii_case("chunked") => Ok(()),
        _ => Err(ProtocolError::UnsupportedTransferEncoding {
            value: value.map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()).unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_content_length_selects_fixed_length() {
        let mut framer = ResponseFramer::new();
        let mut headers = headers(&[("content-length", "3")]);

        assert_eq!(framer.select(&mut headers), Ok(FramingMode::ContentLength(3)));
        assert!(!headers.contains_key(header::TRANSFER_ENCODING));

        let mut dst = Vec::new();
        framer.encode(PayloadItem::Chunk(&b"abc"[..]), &mut dst).unwrap();
        framer.encode(PayloadItem::<&[u8]>::Eof, &mut dst).unwrap();
        assert_eq!(&dst[..], b"abc");
        assert!(framer.is_finish());
    }

    #[test]
    fn test_default_is_chunked() {
        let mut framer = ResponseFramer::new();
        let mut headers = headers(&[("content-type", "text/plain")]);

        assert_eq!(framer.select(&mut headers), Ok(FramingMode::Chunked));
        assert_eq!(headers.get(header::TRANSFER_ENCODING).unwrap(), "chunked");

        let mut dst = Vec::new();
        framer.encode(PayloadItem::Chunk(&b"a"[..]), &mut dst).unwrap();
        framer.encode(PayloadItem::Chunk(&b"bc"[..]), &mut dst).unwrap();
        framer.encode(PayloadItem::<&[u8]>::Eof, &mut dst).unwrap();
        assert_eq!(&dst[..], b"1\r\na\r\n2\r\nbc\r\n0\r\n\r\n");
        assert_eq!(framer.written(), 3);
    }

    #[test]
    fn test_selection_is_one_shot() {
        let mut framer = ResponseFramer::new();
        let mut headers = headers(&[]);
        assert_eq!(framer.select(&mut headers), Ok(FramingMode::Chunked));

        headers.remove(header::TRANSFER_ENCODING);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("10"));
        assert_eq!(framer.select(&mut headers), Ok(FramingMode::Chunked));
        assert_eq!(framer.mode(), FramingMode::Chunked);
    }

    #[test]
    fn test_conflicting_framing() {
        let mut framer = ResponseFramer::new();
        let mut headers = headers(&[("content-length", "3"), ("transfer-encoding", "chunked")]);

        assert_eq!(framer.select(&mut headers), Err(ProtocolError::ConflictingFraming));
        assert_eq!(framer.mode(), FramingMode::Unset);
    }

    #[test]
    fn test_transfer_encoding_must_end_with_chunked() {
        let mut framer = ResponseFramer::new();
        let mut ok = headers(&[("transfer-encoding", "gzip, Chunked")]);
        assert_eq!(framer.select(&mut ok), Ok(FramingMode::Chunked));

        let mut framer = ResponseFramer::new();
        let mut bad = headers(&[("transfer-encoding", "gzip")]);
        assert_eq!(framer.select(&mut bad), Err(ProtocolError::UnsupportedTransferEncoding { value: "gzip".into() }));
    }

    #[test]
    fn test_encode_before_select() {
        let mut framer = ResponseFramer::new();
        let mut dst = Vec::new();

        let error = framer.encode(PayloadItem::Chunk(&b"a"[..]), &mut dst).unwrap_err();
        assert_eq!(error.as_protocol(), Some(&ProtocolError::FramingUnset));
        assert!(dst.is_empty());
    }
}
