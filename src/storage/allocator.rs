//! Block Allocator
//!
//! Capacity rounding, interval collision detection and the free-list.
//!
//! ## Policy
//! - **First-fit**: the first free block (in list order) with enough capacity wins
//! - **No splitting**: a chosen block is consumed whole, even when oversized
//! - **Exhaustive coalescing**: after every insertion no two free blocks touch

use serde::{Deserialize, Serialize};

/// Round `size` up to a multiple of `block_size`
pub fn round_up(size: u64, block_size: u32) -> u64 {
    let block = block_size.max(1) as u64;
    size.div_ceil(block) * block
}

/// A half-open byte range `[offset, offset + capacity)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Block {
    pub offset: u64,
    pub capacity: u64,
}

impl Block {
    pub fn new(offset: u64, capacity: u64) -> Self {
        Self { offset, capacity }
    }

    /// First byte past the block
    pub fn end(&self) -> u64 {
        self.offset + self.capacity
    }

    /// Whether two half-open ranges share at least one byte
    pub fn overlaps(&self, other: &Block) -> bool {
        self.capacity > 0
            && other.capacity > 0
            && self.offset < other.end()
            && other.offset < self.end()
    }
}

/// True if `[start, start + size)` overlaps any of `extents`
pub fn collides<I>(extents: I, start: u64, size: u64) -> bool
where
    I: IntoIterator<Item = Block>,
{
    let candidate = Block::new(start, size);
    extents.into_iter().any(|extent| extent.overlaps(&candidate))
}

/// Reclaimed, block-aligned, currently unused space
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeList {
    blocks: Vec<Block>,
}

impl FreeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted tuples, in their stored order
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// First-fit: remove and return the first block with `capacity >= size`
    pub fn take_first_fit(&mut self, size: u64) -> Option<Block> {
        let idx = self.blocks.iter().position(|b| b.capacity >= size)?;
        Some(self.blocks.remove(idx))
    }

    /// Return `[offset, offset + len)` to the free-list.
    ///
    /// `len` is rounded up to the block size, then neighbours are merged.
    pub fn push(&mut self, offset: u64, len: u64, block_size: u32) {
        let capacity = round_up(len, block_size);
        if capacity == 0 {
            return;
        }
        self.blocks.push(Block::new(offset, capacity));
        self.coalesce();
    }

    /// Sort by offset and merge touching (or overlapping) blocks until stable
    fn coalesce(&mut self) {
        if self.blocks.len() <= 1 {
            return;
        }

        self.blocks.sort_by_key(|b| b.offset);

        let mut merged: Vec<Block> = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.drain(..) {
            match merged.last_mut() {
                Some(current) if current.end() >= block.offset => {
                    let end = current.end().max(block.end());
                    current.capacity = end - current.offset;
                }
                _ => merged.push(block),
            }
        }
        self.blocks = merged;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total reclaimed bytes
    pub fn total_bytes(&self) -> u64 {
        self.blocks.iter().map(|b| b.capacity).sum()
    }
}
