//! An asynchronous HTTP/1.1 response output pipeline
//!
//! This crate implements the write side of an HTTP/1.1 connection: it takes the response
//! body as the application produces it, frames it with `Content-Length` or chunked
//! transfer encoding, buffers it in pooled memory blocks and hands it to the network
//! without ever blocking the writer.
//!
//! # Features
//!
//! - `Content-Length` and chunked framing, selected once from the response headers
//! - Three write flavours: fire-and-forget, threshold flush and transport-confirmed
//! - Pooled, reusable buffer blocks shared between connections
//! - Deferred, strictly ordered flush work on a per-connection queue
//! - Cancellable writes and fail-fast transport error propagation
//! - Streaming of any `http_body::Body` as the response body
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use http::StatusCode;
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//! use tracing::{error, info, Level};
//! use tracing_subscriber::FmtSubscriber;
//! use micro_http_output::buffer::{BlockPool, PoolConfig};
//! use micro_http_output::connection::{OutputPipeline, PipelineConfig};
//! use micro_http_output::executor::SerialQueue;
//! use micro_http_output::transport::StreamTransport;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize logging
//!     let subscriber = FmtSubscriber::builder()
//!         .with_max_level(Level::INFO)
//!         .finish();
//!     tracing::subscriber::set_global_default(subscriber)
//!         .expect("setting default subscriber failed");
//!
//!     let tcp_listener = TcpListener::bind("127.0.0.1:8080").await.expect("bind server");
//!     let pool = BlockPool::new(PoolConfig::default());
//!
//!     loop {
//!         let Ok((tcp_stream, _remote_addr)) = tcp_listener.accept().await else {
//!             continue;
//!         };
//!
//!         let pool = pool.clone();
//!         tokio::spawn(async move {
//!             let transport = Arc::new(StreamTransport::new(tcp_stream));
//!             let config = PipelineConfig::default().with_emit_head(true);
//!             let mut pipeline = OutputPipeline::new(transport, pool, SerialQueue::spawn(), config);
//!             *pipeline.head_mut().expect("nothing written yet").status_mut() = StatusCode::OK;
//!
//!             let token = CancellationToken::new();
//!             for line in ["Hello", " ", "World!\r\n"] {
//!                 if let Err(e) = pipeline.write_async(line.as_bytes(), &token).await {
//!                     error!(cause = %e, "write response error");
//!                     return;
//!                 }
//!             }
//!
//!             match pipeline.produce_end().await {
//!                 Ok(()) => info!("response finished"),
//!                 Err(e) => error!(cause = %e, "finish response error"),
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`buffer`]: the pooled block arena and the per-connection block chain
//! - [`codec`]: response head serialization and body framing
//! - [`executor`]: deferred, ordered execution of flush work
//! - [`transport`]: the boundary to the peer
//! - [`connection`]: the [`connection::OutputPipeline`] tying it all together
//! - [`protocol`]: shared protocol types and the error taxonomy
//!
//! # Error Handling
//!
//! Every call returns [`protocol::OutputError`], which keeps framing violations
//! ([`protocol::ProtocolError`]), transport failures, pool failures
//! ([`protocol::PoolError`]) and cancellation apart.
//!
//! # Limitations
//!
//! - HTTP/1.1 only
//! - No trailers after the chunked terminator
//! - No content coding; the body is written as given

pub mod buffer;
pub mod codec;
pub mod connection;
pub mod executor;
pub mod protocol;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;

#[cfg(test)]
mod test_support;
