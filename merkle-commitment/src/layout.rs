//! Buffer layout of the dense tree.
//!
//! The committed buffer is a sequence of 16-byte *blocks*; two adjacent
//! blocks form a *dual block*, the input of one compression. For a buffer of
//! `2^L` bytes the tree has `2^(L-5)` dual blocks and height `L - 5`.
//!
//! Tree nodes are stored heap-style in a destination buffer of the same size:
//! node `(level, position)` has heap index `2^(height - level) + position` and
//! lives at byte offset `16 * heap`. Level 0 holds the compressed dual blocks,
//! the root (heap index 1) sits at offset 16 and the first 16 bytes are
//! unused. The two children of heap node `j` are `2j` and `2j + 1`, so each
//! compression reads one contiguous dual block of the level below.

use crate::{CommitmentError, error::Result};

/// `log2` of the digest and block size.
pub const LOG_BYTES_PER_HASH: u32 = 4;
/// Size of a block (and of a digest) in bytes.
pub const BLOCK_SIZE: usize = 1 << LOG_BYTES_PER_HASH;
/// Size of a dual block, the input of one compression.
pub const DUAL_BLOCK_SIZE: usize = 2 * BLOCK_SIZE;
/// Smallest committable buffer: a single dual block.
pub const MIN_LOG_LEN: u32 = LOG_BYTES_PER_HASH + 1;
/// Largest committable buffer.
pub const MAX_LOG_LEN: u32 = usize::BITS - 1;

/// Index of the block containing byte `element_index`.
pub const fn block_index(element_index: usize) -> usize {
    element_index >> LOG_BYTES_PER_HASH
}

/// Byte index of the first byte of block `block_index`.
pub const fn element_index(block_index: usize) -> usize {
    block_index << LOG_BYTES_PER_HASH
}

/// Offset of byte `index` within its block.
pub const fn offset_in_block(index: usize) -> usize {
    index & (BLOCK_SIZE - 1)
}

/// Offset of byte `index` within its dual block.
pub const fn offset_in_dual_block(index: usize) -> usize {
    index & (DUAL_BLOCK_SIZE - 1)
}

/// Index arithmetic for a tree over a buffer of `2^src_log_len` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeLayout {
    src_log_len: u32,
}

impl TreeLayout {
    /// Layout for a `2^src_log_len` byte buffer.
    pub fn new(src_log_len: u32) -> Result<Self> {
        if !(MIN_LOG_LEN..=MAX_LOG_LEN).contains(&src_log_len) {
            return Err(CommitmentError::LogLengthOutOfRange(src_log_len));
        }
        Ok(Self { src_log_len })
    }

    /// Layout matching a buffer, which must be a power of two of at least one
    /// dual block.
    pub fn for_buffer(len: usize) -> Result<Self> {
        if !len.is_power_of_two() || len < DUAL_BLOCK_SIZE {
            return Err(CommitmentError::NotPowerOfTwo(len));
        }
        Self::new(len.ilog2())
    }

    /// `log2` of the buffer length in bytes.
    pub fn src_log_len(&self) -> u32 {
        self.src_log_len
    }

    /// Buffer length in bytes; also the required destination length.
    pub fn byte_len(&self) -> usize {
        1 << self.src_log_len
    }

    /// Number of levels above level 0, and the length of every path.
    pub fn height(&self) -> u32 {
        self.src_log_len - MIN_LOG_LEN
    }

    /// Number of 16-byte blocks in the buffer.
    pub fn block_count(&self) -> usize {
        1 << (self.src_log_len - LOG_BYTES_PER_HASH)
    }

    /// Number of dual blocks, i.e. of level 0 nodes.
    pub fn pair_count(&self) -> usize {
        1 << self.height()
    }

    /// Number of nodes on `level`.
    pub fn nodes_at(&self, level: u32) -> usize {
        self.pair_count() >> level
    }

    /// Heap index of node `(level, position)`.
    pub fn heap_index(&self, level: u32, position: usize) -> usize {
        debug_assert!(level <= self.height() && position < self.nodes_at(level));
        self.nodes_at(level) + position
    }

    /// Byte offset of node `(level, position)` in the destination buffer.
    pub fn node_offset(&self, level: u32, position: usize) -> usize {
        self.heap_index(level, position) * BLOCK_SIZE
    }

    /// Inverse of [`node_offset`](Self::node_offset); `None` for offsets that
    /// do not start a node.
    pub fn node_at_offset(&self, offset: usize) -> Option<(u32, usize)> {
        if offset_in_block(offset) != 0 {
            return None;
        }
        let heap = block_index(offset);
        if heap == 0 || heap >= 2 * self.pair_count() {
            return None;
        }
        let row = heap.ilog2();
        Some((self.height() - row, heap - (1 << row)))
    }

    /// Byte offset of the root digest.
    pub fn root_offset(&self) -> usize {
        self.node_offset(self.height(), 0)
    }

    /// Check that `len` is exactly the buffer length.
    pub(crate) fn check_source(&self, len: usize) -> Result<()> {
        if len != self.byte_len() {
            return Err(CommitmentError::InvalidBufferLength {
                len,
                log_len: self.src_log_len,
            });
        }
        Ok(())
    }

    /// Check that `len` can hold every node.
    pub(crate) fn check_destination(&self, len: usize) -> Result<()> {
        if len < self.byte_len() {
            return Err(CommitmentError::BufferTooSmall {
                needed: self.byte_len(),
                got: len,
            });
        }
        Ok(())
    }

    /// Check that `block_index` addresses a block of the buffer.
    pub(crate) fn check_block(&self, block_index: usize) -> Result<()> {
        if block_index >= self.block_count() {
            return Err(CommitmentError::IndexOutOfRange {
                index: block_index,
                bound: self.block_count(),
            });
        }
        Ok(())
    }
}
