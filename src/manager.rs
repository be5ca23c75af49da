//! Storage Manager
//!
//! Owns the file handle and runtime state, and exposes the public API.
//!
//! ## Responsibilities
//! - File lifecycle (open / create / close)
//! - Guarding every operation against a closed handle
//! - Delegating to the collection store, payload codec and compaction engine
//! - Refreshing the CRC on clean shutdown
//!
//! ## Concurrency Model: Single-Flight
//!
//! The runtime state (directory, free-list, file size) is mutated across
//! several I/O steps per operation, so operations against one file must never
//! interleave.
//!
//! - [`StorageManager`] takes `&mut self` for every operation: one owner,
//!   strictly serialized by the borrow checker
//! - [`SharedStorage`] wraps it in `Arc<Mutex<_>>` for multi-threaded callers;
//!   each operation holds the lock for its whole duration
//!
//! There is no cross-process locking: two processes must not open the same
//! path at once.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::{CompactionMode, Config};
use crate::error::{Result, VaultError};
use crate::events::{emit, Severity};
use crate::integrity::{self, FileCrc};
use crate::storage::{collection, compaction, open_file, payload, RuntimeState};

/// An open file and its in-memory state
struct OpenHandle {
    file: File,
    state: RuntimeState,
}

/// Summary of an open file's layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub file_size: u64,
    pub block_size: u32,
    pub collections: usize,
    pub free_blocks: usize,
    pub free_bytes: u64,
    pub payload_length: u32,
}

/// Single-file, multi-collection storage manager
pub struct StorageManager {
    /// Validated configuration
    config: Config,

    /// Present between `open()` and `close()`
    handle: Option<OpenHandle>,
}

impl StorageManager {
    /// Create a manager for `config` (the file is not touched until `open()`)
    pub fn new(config: Config) -> Self {
        Self { config, handle: None }
    }

    /// Create and open in one step
    pub fn open_with(config: Config) -> Result<Self> {
        let mut manager = Self::new(config);
        manager.open()?;
        Ok(manager)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified file path
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(Config::for_path(path.as_ref())?)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the file read-write (creating and bootstrapping it if needed)
    /// and load the directory.
    pub fn open(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(VaultError::AlreadyOpen);
        }

        let mut file = open_file(&self.config.path)?;
        let state = payload::load(&mut file, &self.config)?;

        emit!(
            &*self.config.events,
            Severity::Info,
            "File opened",
            path = self.config.path.display(),
            collections = state.collections.len(),
            file_size = state.file_size,
        );

        self.handle = Some(OpenHandle { file, state });
        Ok(())
    }

    /// Stamp a fresh CRC (when enabled), sync and release the handle
    pub fn close(&mut self) -> Result<()> {
        let mut handle = self.handle.take().ok_or(VaultError::NotOpen)?;

        if self.config.crc.is_enabled() {
            let crc = integrity::stamp_crc(&mut handle.file)?;
            emit!(&*self.config.events, Severity::Debug, "CRC refreshed", crc = format!("{:#010x}", crc));
        }
        handle.file.sync_all()?;

        emit!(&*self.config.events, Severity::Info, "File closed", path = self.config.path.display());
        Ok(())
    }

    /// Whether a handle is currently open
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Replace the content of `name` with `records`
    pub fn write(&mut self, name: &str, records: &[Value]) -> Result<()> {
        self.write_records(name, records)
    }

    /// Replace the content of `name` with any serializable records
    pub fn write_records<T: Serialize>(&mut self, name: &str, records: &[T]) -> Result<()> {
        let Self { config, handle } = self;
        let handle = handle.as_mut().ok_or(VaultError::NotOpen)?;
        collection::write(&mut handle.file, &mut handle.state, config, name, records)
    }

    /// Read the records stored under `name`
    pub fn read(&mut self, name: &str) -> Result<Vec<Value>> {
        self.read_records(name)
    }

    /// Read and deserialize the records stored under `name`
    pub fn read_records<T: DeserializeOwned>(&mut self, name: &str) -> Result<Vec<T>> {
        let Self { config, handle } = self;
        let handle = handle.as_mut().ok_or(VaultError::NotOpen)?;
        collection::read(&mut handle.file, &handle.state, config, name)
    }

    /// Delete `name` and reclaim its region
    pub fn remove_collection(&mut self, name: &str) -> Result<()> {
        let Self { config, handle } = self;
        let handle = handle.as_mut().ok_or(VaultError::NotOpen)?;
        collection::remove(&mut handle.file, &mut handle.state, config, name)
    }

    /// Create `name` as an empty collection if it does not exist.
    ///
    /// Returns true if it was created.
    pub fn ensure_collection(&mut self, name: &str) -> Result<bool> {
        if self.has_collection(name)? {
            return Ok(false);
        }
        self.write(name, &[])?;
        Ok(true)
    }

    /// Live collection names, in directory order
    pub fn collections(&self) -> Result<Vec<String>> {
        Ok(self
            .state()?
            .collections
            .iter()
            .map(|c| c.name.clone())
            .collect())
    }

    /// Whether `name` is in the directory
    pub fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.state()?.find(name).is_some())
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Defragment the file: every collection is rewritten back to back with
    /// a capacity matching its content, and the free-list ends up empty.
    pub fn optimize(&mut self) -> Result<()> {
        let Self { config, handle } = self;
        let config = &*config;
        let open = handle.as_mut().ok_or(VaultError::NotOpen)?;
        let contents = compaction::snapshot(&mut open.file, &open.state)?;

        emit!(
            &*config.events,
            Severity::Info,
            "Compaction started",
            collections = contents.len(),
            free_blocks = open.state.free_list.len(),
        );

        let (file, state) = match config.compaction {
            CompactionMode::Staged => compaction::compact_staged(&config.path, &contents, config)?,
            CompactionMode::InPlace => {
                // Release the handle before the file is deleted
                *handle = None;
                compaction::compact_in_place(&config.path, &contents, config)?
            }
        };

        *handle = Some(OpenHandle { file, state });
        Ok(())
    }

    /// Compute the stored and actual whole-file CRC
    pub fn verify(&mut self) -> Result<FileCrc> {
        let handle = self.handle.as_mut().ok_or(VaultError::NotOpen)?;
        integrity::file_crc(&mut handle.file)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// In-memory directory, free-list and geometry
    pub fn state(&self) -> Result<&RuntimeState> {
        self.handle
            .as_ref()
            .map(|h| &h.state)
            .ok_or(VaultError::NotOpen)
    }

    /// Layout summary
    pub fn stats(&self) -> Result<StorageStats> {
        let state = self.state()?;
        Ok(StorageStats {
            file_size: state.file_size,
            block_size: state.block_size,
            collections: state.collections.len(),
            free_blocks: state.free_list.len(),
            free_bytes: state.free_list.total_bytes(),
            payload_length: state.payload_length,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the storage file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

impl Drop for StorageManager {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.close() {
                emit!(&*self.config.events, Severity::Error, "Close on drop failed", error = e);
            }
        }
    }
}

// =============================================================================
// Shared Handle
// =============================================================================

/// Cloneable, thread-safe handle that runs operations one at a time
#[derive(Clone)]
pub struct SharedStorage {
    inner: Arc<Mutex<StorageManager>>,
}

impl SharedStorage {
    pub fn new(manager: StorageManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// Run several steps as one uninterrupted operation
    pub fn with<R>(&self, f: impl FnOnce(&mut StorageManager) -> R) -> R {
        let mut manager = self.inner.lock();
        f(&mut manager)
    }

    pub fn open(&self) -> Result<()> {
        self.inner.lock().open()
    }

    pub fn close(&self) -> Result<()> {
        self.inner.lock().close()
    }

    pub fn write(&self, name: &str, records: &[Value]) -> Result<()> {
        self.inner.lock().write(name, records)
    }

    pub fn read(&self, name: &str) -> Result<Vec<Value>> {
        self.inner.lock().read(name)
    }

    pub fn remove_collection(&self, name: &str) -> Result<()> {
        self.inner.lock().remove_collection(name)
    }

    pub fn optimize(&self) -> Result<()> {
        self.inner.lock().optimize()
    }

    pub fn collections(&self) -> Result<Vec<String>> {
        self.inner.lock().collections()
    }

    pub fn stats(&self) -> Result<StorageStats> {
        self.inner.lock().stats()
    }
}
