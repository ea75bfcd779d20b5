//! Per-connection response output.
//!
//! This module ties the pieces of the crate together for one connection: the
//! [`OutputPipeline`] accepts application writes, frames them through the
//! [`ResponseFramer`](crate::codec::ResponseFramer), buffers the framed bytes in pooled
//! blocks and hands them to a [`Transport`](crate::transport::Transport) on a
//! [`Schedule`](crate::executor::Schedule) implementation.
//!
//! # Components
//!
//! - [`OutputPipeline`]: the write, flush and finalization entry points
//! - [`PipelineConfig`]: flush threshold and head emission
//! - [`WriteHandle`]: the future returned by the asynchronous calls
//!
//! # Failure model
//!
//! The first transport failure is recorded once and shared: in-flight flushes stop
//! delivering, their handles fail with that cause and every later call fails with it
//! too. Protocol violations abort the pipeline the same way without touching the
//! transport.

mod config;
mod flush;
mod output_pipeline;
mod write_handle;

pub use config::{DEFAULT_FLUSH_THRESHOLD, PipelineConfig};
pub use output_pipeline::OutputPipeline;
pub use write_handle::WriteHandle;
