//! Storage Module
//!
//! Single-file, multi-collection storage layer.
//!
//! ## Responsibilities
//! - Header + relocatable payload (directory and free-list)
//! - Block-aligned allocation with first-fit free-list reuse
//! - Per-collection length-prefixed regions
//! - Full-file compaction
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Header (64 bytes)                      │
//! │ ┌────────┬────────┬────────┬─────────┐ │
//! │ │Version │PayLen  │PayOff  │BlockSize│ │
//! │ ├────────┼────────┴────────┴─────────┤ │
//! │ │ CRC32  │ Reserved                  │ │
//! │ └────────┴───────────────────────────┘ │
//! ├────────────────────────────────────────┤
//! │ Payload (block-aligned, relocatable)   │
//! │   directory + free-list                │
//! ├────────────────────────────────────────┤
//! │ Collection region                      │
//! │ ┌────────┬──────────────┬───────────┐  │
//! │ │Len (4) │ Encoded data │ Zero pad  │  │
//! │ └────────┴──────────────┴───────────┘  │
//! │ ... (one region per live collection)   │
//! └────────────────────────────────────────┘
//! ```
//!
//! Regions are pairwise disjoint at rest and every capacity is a multiple of
//! the file's block size.

pub mod allocator;
pub mod collection;
pub mod compaction;
pub mod header;
pub mod payload;
pub mod region;
pub mod state;

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::Result;

pub use allocator::{round_up, Block, FreeList};
pub use header::{Header, HEADER_SIZE, MAX_PAYLOAD_SIZE, VERSION};
pub use state::{CollectionMeta, Occupant, Placement, RuntimeState};

/// Open `path` for read-write, creating it if absent
pub fn open_file(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    Ok(file)
}
