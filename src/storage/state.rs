//! Runtime State
//!
//! In-memory mirror of the directory, free-list and file geometry, owned
//! exclusively by the open storage manager.

use super::allocator::{collides, round_up, Block, FreeList};
use super::header::HEADER_SIZE;

/// One named data region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMeta {
    /// Unique collection name
    pub name: String,
    /// Absolute file offset of the region
    pub offset: u64,
    /// Block-aligned region size
    pub capacity: u64,
}

impl CollectionMeta {
    pub fn region(&self) -> Block {
        Block::new(self.offset, self.capacity)
    }
}

/// Which tracked region a collision check should ignore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant<'a> {
    /// The named collection's own region
    Collection(&'a str),
    /// The header payload's own region
    Payload,
}

/// Directory, free-list and geometry of an open file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeState {
    /// Live collections, in directory order
    pub collections: Vec<CollectionMeta>,
    /// Reclaimed space
    pub free_list: FreeList,
    /// Bytes the file spans (tracked regions included)
    pub file_size: u64,
    /// Encoded size of the last persisted payload
    pub payload_length: u32,
    /// Payload position relative to the end of the header
    pub payload_offset: u32,
    /// Allocation granularity of this file
    pub block_size: u32,
}

impl RuntimeState {
    /// Empty state for a file being bootstrapped
    pub fn empty(file_size: u64, block_size: u32) -> Self {
        Self {
            collections: Vec::new(),
            free_list: FreeList::new(),
            file_size,
            payload_length: 0,
            payload_offset: 0,
            block_size,
        }
    }

    pub fn round_up(&self, size: u64) -> u64 {
        round_up(size, self.block_size)
    }

    /// Region currently reserved by the persisted payload
    pub fn payload_region(&self) -> Block {
        Block::new(
            HEADER_SIZE + self.payload_offset as u64,
            self.round_up(self.payload_length as u64),
        )
    }

    pub fn find(&self, name: &str) -> Option<&CollectionMeta> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.collections.iter().position(|c| c.name == name)
    }

    /// Whether `[start, start + size)` overlaps any tracked region other than `exclude`.
    ///
    /// Tracked regions are every collection, the payload and every free block;
    /// free blocks count because they may be handed out later.
    pub fn collides(&self, start: u64, size: u64, exclude: Occupant<'_>) -> bool {
        let collections = self
            .collections
            .iter()
            .filter(|c| exclude != Occupant::Collection(c.name.as_str()))
            .map(CollectionMeta::region);
        let payload = (exclude != Occupant::Payload)
            .then(|| self.payload_region())
            .into_iter();
        let free = self.free_list.iter().copied();

        collides(collections.chain(payload).chain(free), start, size)
    }

    /// Place `capacity` bytes: reuse a free block (first-fit) or append at end of file
    pub fn allocate(&mut self, capacity: u64) -> Placement {
        match self.free_list.take_first_fit(capacity) {
            Some(block) => Placement::Reused(block),
            None => {
                let offset = self.file_size;
                self.file_size += capacity;
                Placement::Appended(offset)
            }
        }
    }

    /// Return a region to the free-list
    pub fn release(&mut self, region: Block) {
        self.free_list.push(region.offset, region.capacity, self.block_size);
    }

    /// Extend the tracked file size to cover `[offset, offset + len)`
    pub fn cover(&mut self, offset: u64, len: u64) {
        self.file_size = self.file_size.max(offset + len);
    }
}

/// Where an allocation landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// A whole free block was consumed
    Reused(Block),
    /// Appended at the previous end of file
    Appended(u64),
}

impl Placement {
    pub fn offset(&self) -> u64 {
        match self {
            Placement::Reused(block) => block.offset,
            Placement::Appended(offset) => *offset,
        }
    }
}
