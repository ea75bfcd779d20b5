//! Core protocol types of the response output path.
//!
//! - **Message Handling** ([`message`]): payload items fed to the framer and the
//!   [`FramingMode`] state of one response
//! - **Response Processing** ([`response`]): the [`ResponseHead`] and the header
//!   inspection needed to pick a framing mode
//! - **Error Handling** ([`error`]): the error taxonomy
//!   - [`OutputError`]: Top-level error type
//!   - [`ProtocolError`]: Framing violations caused by the application
//!   - [`PoolError`]: Buffer pool failures

mod message;
pub use message::FramingMode;
pub use message::PayloadItem;

mod response;
pub use response::ResponseHead;
pub(crate) use response::{declared_content_length, has_transfer_encoding};

mod error;
pub use error::OutputError;
pub use error::PoolError;
pub use error::ProtocolError;
