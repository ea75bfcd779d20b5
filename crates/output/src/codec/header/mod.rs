//! HTTP response head encoding.
//!
//! - [`HeaderEncoder`]: Encodes the status line and header block to bytes

mod header_encoder;

pub use header_encoder::HeaderEncoder;
