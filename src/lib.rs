//! # BinVault
//!
//! A single-file, multi-collection binary storage engine with:
//! - Several independently growable named collections in one file
//! - A compact versioned header and a relocatable directory payload
//! - Block-aligned allocation with first-fit free-list reuse and coalescing
//! - Optional whole-file CRC32 integrity checking
//! - Compaction that defragments the whole file in one pass
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageManager                           │
//! │        (file lifecycle, single-flight public API)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────────────┐
//!          │            │                     │
//!          ▼            ▼                     ▼
//!   ┌─────────────┐ ┌──────────────┐  ┌──────────────┐
//!   │ Collection  │ │  Compaction  │  │  Integrity   │
//!   │   Store     │ │    Engine    │  │   (CRC32)    │
//!   └──────┬──────┘ └──────┬───────┘  └──────────────┘
//!          │               │
//!          ▼               ▼
//!   ┌─────────────────────────────┐
//!   │   Header Payload Codec      │
//!   │ (directory + free-list)     │
//!   └──────────────┬──────────────┘
//!                  ▼
//!          ┌──────────────┐
//!          │   Block      │
//!          │  Allocator   │
//!          └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use binvault::{Config, StorageManager};
//! use serde_json::json;
//!
//! # fn main() -> binvault::Result<()> {
//! let config = Config::builder().path("data.bv").build()?;
//! let mut db = StorageManager::open_with(config)?;
//!
//! db.write("users", &[json!({"id": 1, "name": "Alice"})])?;
//! let users = db.read("users")?;
//! assert_eq!(users, vec![json!({"id": 1, "name": "Alice"})]);
//!
//! db.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod events;
pub mod codec;

pub mod integrity;
pub mod storage;
pub mod manager;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use codec::Codec;
pub use config::{CompactionMode, Config, CrcPolicy};
pub use error::{Result, VaultError};
pub use events::{EventSink, NullSink, Severity, TracingSink};
pub use integrity::FileCrc;
pub use manager::{SharedStorage, StorageManager, StorageStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of BinVault
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
