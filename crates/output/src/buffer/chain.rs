use std::collections::VecDeque;

use bytes::BytesMut;

use crate::buffer::{BlockPool, PooledBlock};
use crate::protocol::PoolError;

/// Destination for framed bytes.
///
/// The framer writes through this trait so the same encoders serve the pooled
/// [`BlockChain`] of a live connection and plain buffers in tests and benchmarks.
pub trait FrameSink {
    fn put_slice(&mut self, src: &[u8]) -> Result<(), PoolError>;
}

impl FrameSink for Vec<u8> {
    fn put_slice(&mut self, src: &[u8]) -> Result<(), PoolError> {
        self.extend_from_slice(src);
        Ok(())
    }
}

impl FrameSink for BytesMut {
    fn put_slice(&mut self, src: &[u8]) -> Result<(), PoolError> {
        self.extend_from_slice(src);
        Ok(())
    }
}

/// Unflushed bytes of one connection, kept as an ordered run of pooled blocks.
///
/// Bytes are appended to the newest block until it is full, then a fresh block is
/// leased. [`BlockChain::take`] hands the whole run, oldest block first, to a flush.
#[derive(Debug)]
pub struct BlockChain {
    pool: BlockPool,
    blocks: VecDeque<PooledBlock>,
    len: usize,
}

impl BlockChain {
    pub fn new(pool: BlockPool) -> Self {
        Self { pool, blocks: VecDeque::new(), len: 0 }
    }

    /// Number of buffered bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Detaches every buffered block, oldest first, leaving the chain empty.
    pub fn take(&mut self) -> Vec<PooledBlock> {
        self.len = 0;
        self.blocks.drain(..).filter(|block| !block.is_empty()).collect()
    }
}

impl FrameSink for BlockChain {
    fn put_slice(&mut self, mut src: &[u8]) -> Result<(), PoolError> {
        while !src.is_empty() {
            if self.blocks.back().is_none_or(|block| block.remaining_mut() == 0) {
                let block = self.pool.lease(self.pool.block_size())?;
                self.blocks.push_back(block);
            }

            if let Some(block) = self.blocks.back_mut() {
                let n = block.put(src);
                self.len += n;
                src = &src[n..];
            }
        }
        Ok(())
    }
}
