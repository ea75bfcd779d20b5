//! Pooled buffer arena.
//!
//! Every byte the pipeline buffers lives in a fixed-capacity block leased from a
//! [`BlockPool`]. Blocks go back to the pool once the transport has confirmed them,
//! so a connection that keeps writing settles on a stable set of allocations instead of
//! hitting the allocator per write.
//!
//! The pool is the one piece of state that may be shared between connections, so its
//! free list sits behind a mutex. Blocks themselves are owned by exactly one lease at a
//! time; a block dropped without an explicit [`BlockPool::give_back`] still returns to
//! its pool.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::error;
use triomphe::Arc;

use crate::protocol::PoolError;

/// Default capacity of a pooled block
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024;

/// Sizing of a [`BlockPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    block_size: usize,
    max_blocks: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { block_size: DEFAULT_BLOCK_SIZE, max_blocks: None }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity of freshly allocated blocks. A lease asking for more gets a block of
    /// exactly the requested size instead.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Upper bound on the number of blocks the pool will ever allocate.
    pub fn with_max_blocks(mut self, max_blocks: usize) -> Self {
        self.max_blocks = Some(max_blocks);
        self
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn max_blocks(&self) -> Option<usize> {
        self.max_blocks
    }
}

/// A thread-safe arena of reusable byte blocks.
///
/// Cloning a `BlockPool` is cheap and yields a handle to the same arena.
#[derive(Clone)]
pub struct BlockPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

#[derive(Default)]
struct PoolState {
    /// One entry per block ever allocated, indexed by slot.
    slots: Vec<Slot>,
    /// Free blocks, most recently returned last.
    free: Vec<(usize, Vec<u8>)>,
    allocated_bytes: usize,
    leased: usize,
    high_water: usize,
}

struct Slot {
    capacity: usize,
    leased: bool,
}

impl BlockPool {
    pub fn new(config: PoolConfig) -> Self {
        Self { inner: Arc::new(PoolInner { config, state: Mutex::new(PoolState::default()) }) }
    }

    /// Leases a block with room for at least `min_size` bytes.
    ///
    /// The most recently returned free block that is large enough is reused; otherwise a
    /// new block of `max(min_size, block_size)` bytes is allocated.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Exhausted`] when a new block is needed but `max_blocks` are already allocated
    /// - [`PoolError::OutOfMemory`] when the allocator refuses the new block
    pub fn lease(&self, min_size: usize) -> Result<PooledBlock, PoolError> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;

        let reusable = state.free.iter().rposition(|(slot, _)| state.slots[*slot].capacity >= min_size);
        if let Some(position) = reusable {
            let (slot, buf) = state.free.swap_remove(position);
            state.slots[slot].leased = true;
            state.mark_leased();
            return Ok(PooledBlock { buf: Some(buf), slot, pool: Arc::clone(&self.inner) });
        }

        if let Some(limit) = self.inner.config.max_blocks
            && state.slots.len() >= limit
        {
            return Err(PoolError::Exhausted { limit });
        }

        let requested = min_size.max(self.inner.config.block_size);
        let mut buf = Vec::new();
        buf.try_reserve_exact(requested).map_err(|_| PoolError::OutOfMemory { requested })?;

        let slot = state.slots.len();
        state.slots.push(Slot { capacity: buf.capacity(), leased: true });
        state.allocated_bytes += buf.capacity();
        state.mark_leased();
        Ok(PooledBlock { buf: Some(buf), slot, pool: Arc::clone(&self.inner) })
    }

    /// Makes `block` available for reuse.
    ///
    /// # Errors
    ///
    /// [`PoolError::ForeignBlock`] when the block was leased from another pool; the block
    /// still goes back to its own pool.
    pub fn give_back(&self, block: PooledBlock) -> Result<(), PoolError> {
        if !Arc::ptr_eq(&self.inner, &block.pool) {
            return Err(PoolError::ForeignBlock);
        }
        block.release()
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.inner.config.block_size
    }

    /// Total bytes ever allocated by this pool, leased or free.
    pub fn allocated_bytes(&self) -> usize {
        self.inner.lock().allocated_bytes
    }

    /// Number of blocks currently out on lease.
    pub fn leased_blocks(&self) -> usize {
        self.inner.lock().leased
    }

    /// Number of blocks waiting in the free list.
    pub fn free_blocks(&self) -> usize {
        self.inner.lock().free.len()
    }

    /// The largest number of blocks that were leased at the same time.
    pub fn high_water_blocks(&self) -> usize {
        self.inner.lock().high_water
    }
}

impl fmt::Debug for BlockPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("BlockPool")
            .field("config", &self.inner.config)
            .field("allocated_bytes", &state.allocated_bytes)
            .field("leased", &state.leased)
            .field("free", &state.free.len())
            .finish()
    }
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn recycle(&self, slot: usize, mut buf: Vec<u8>) -> Result<(), PoolError> {
        let mut state = self.lock();
        match state.slots.get_mut(slot) {
            Some(entry) if entry.leased => entry.leased = false,
            _ => {
                error!(slot, "block returned to the pool while not leased");
                return Err(PoolError::NotLeased { slot });
            }
        }

        buf.clear();
        state.free.push((slot, buf));
        state.leased -= 1;
        Ok(())
    }
}

impl PoolState {
    fn mark_leased(&mut self) {
        self.leased += 1;
        self.high_water = self.high_water.max(self.leased);
    }
}

/// A fixed-capacity byte block leased from a [`BlockPool`].
///
/// Writes never grow the block past the capacity it was leased with.
pub struct PooledBlock {
    buf: Option<Vec<u8>>,
    slot: usize,
    pool: Arc<PoolInner>,
}

impl PooledBlock {
    /// Copies as much of `src` as fits and returns the number of bytes taken.
    pub fn put(&mut self, src: &[u8]) -> usize {
        let Some(buf) = self.buf.as_mut() else {
            return 0;
        };
        let n = src.len().min(buf.capacity() - buf.len());
        buf.extend_from_slice(&src[..n]);
        n
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.as_ref().map_or(0, Vec::capacity)
    }

    /// Bytes that can still be written before the block is full.
    #[inline]
    pub fn remaining_mut(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Returns the block to the pool it was leased from.
    pub fn release(mut self) -> Result<(), PoolError> {
        match self.buf.take() {
            Some(buf) => self.pool.recycle(self.slot, buf),
            None => Err(PoolError::NotLeased { slot: self.slot }),
        }
    }
}

impl AsRef<[u8]> for PooledBlock {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Drop for PooledBlock {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            // recycle already logs the failure
            let _ = self.pool.recycle(self.slot, buf);
        }
    }
}

impl fmt::Debug for PooledBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBlock").field("slot", &self.slot).field("len", &self.len()).field("capacity", &self.capacity()).finish()
    }
}
