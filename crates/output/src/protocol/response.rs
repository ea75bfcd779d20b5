//! HTTP response header handling.
//!
//! The pipeline keeps the response head as a plain `http::Response<()>`: status,
//! version and an insertion-ordered, case-insensitive header map. Only the parts that
//! decide the body framing are interpreted here.

use http::{HeaderMap, Response, header};

use crate::protocol::ProtocolError;

/// Type alias for HTTP response headers.
///
/// This type represents the header portion of an HTTP response, using
/// `http::Response<()>` with an empty body placeholder.
pub type ResponseHead = Response<()>;

/// Reads the `Content-Length` header, if present.
///
/// Repeated values are accepted only when they all agree.
pub(crate) fn declared_content_length(headers: &HeaderMap) -> Result<Option<u64>, ProtocolError> {
    let mut declared = None;
    for value in headers.get_all(header::CONTENT_LENGTH) {
        let text = value.to_str().map_err(|_| ProtocolError::invalid_content_length("value is not visible ascii"))?;
        let length = text
            .trim()
            .parse::<u64>()
            .map_err(|e| ProtocolError::invalid_content_length(format!("{text:?}: {e}")))?;

        match declared {
            Some(previous) if previous != length => {
                return Err(ProtocolError::invalid_content_length(format!("conflicting values {previous} and {length}")));
            }
            _ => declared = Some(length),
        }
    }
    Ok(declared)
}

/// Returns true when a `Transfer-Encoding` header is present.
pub(crate) fn has_transfer_encoding(headers: &HeaderMap) -> bool {
    headers.contains_key(header::TRANSFER_ENCODING)
}
