//! HTTP response framing.
//!
//! - [`ResponseFramer`]: selects the framing mode of a response and wraps payload bytes
//! - Body encoding via [`body`]: [`ChunkedEncoder`](body::ChunkedEncoder) and
//!   [`LengthEncoder`](body::LengthEncoder)
//! - Head encoding via [`header`]: [`HeaderEncoder`]

pub mod body;
mod header;
mod response_framer;

pub use header::HeaderEncoder;
pub use response_framer::ResponseFramer;
