//! Pooled buffering for the output path.
//!
//! - [`BlockPool`]: the shared arena of fixed-capacity blocks
//! - [`BlockChain`]: the ordered, unflushed blocks of one connection
//! - [`FrameSink`]: where the framer writes its output

mod chain;
mod pool;

pub use chain::BlockChain;
pub use chain::FrameSink;
pub use pool::BlockPool;
pub use pool::DEFAULT_BLOCK_SIZE;
pub use pool::PoolConfig;
pub use pool::PooledBlock;
