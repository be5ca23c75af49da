//! Configuration for BinVault
//!
//! Explicit configuration, built once and validated before any file is touched.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::codec::Codec;
use crate::error::{Result, VaultError};
use crate::events::{EventSink, TracingSink};

/// Default allocation granularity in bytes
pub const DEFAULT_BLOCK_SIZE: u32 = 256;

/// Default pause between deleting and recreating the file during in-place compaction
pub const DEFAULT_RELEASE_PAUSE: Duration = Duration::from_millis(100);

/// Main configuration for a BinVault file
#[derive(Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // File Configuration
    // -------------------------------------------------------------------------
    /// Path of the storage file (created on first open)
    pub path: PathBuf,

    /// Block granularity used when the file is created.
    /// Existing files keep the block size recorded in their header.
    pub preferred_size: u32,

    // -------------------------------------------------------------------------
    // Integrity Configuration
    // -------------------------------------------------------------------------
    /// CRC policy applied on open and when stamping the header
    pub crc: CrcPolicy,

    // -------------------------------------------------------------------------
    // Encoding Configuration
    // -------------------------------------------------------------------------
    /// Codec for collection contents and the directory payload
    pub codec: Codec,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// How `optimize()` replaces the file
    pub compaction: CompactionMode,

    /// Pause between delete and reopen (in-place compaction only)
    pub release_pause: Duration,

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------
    /// Receiver of diagnostic events
    pub events: Arc<dyn EventSink>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("preferred_size", &self.preferred_size)
            .field("crc", &self.crc)
            .field("codec", &self.codec)
            .field("compaction", &self.compaction)
            .field("release_pause", &self.release_pause)
            .finish_non_exhaustive()
    }
}

/// CRC policy levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrcPolicy {
    /// Never read or written (level 0)
    Disabled,

    /// Log mismatches and proceed (level 1)
    Warn,

    /// Fail on mismatch (level 2)
    #[default]
    Strict,
}

impl CrcPolicy {
    /// Whether the CRC field is maintained at all
    pub fn is_enabled(&self) -> bool {
        !matches!(self, CrcPolicy::Disabled)
    }

    /// Numeric level (0, 1 or 2)
    pub fn level(&self) -> u8 {
        match self {
            CrcPolicy::Disabled => 0,
            CrcPolicy::Warn => 1,
            CrcPolicy::Strict => 2,
        }
    }
}

impl TryFrom<u8> for CrcPolicy {
    type Error = VaultError;

    fn try_from(level: u8) -> Result<Self> {
        match level {
            0 => Ok(CrcPolicy::Disabled),
            1 => Ok(CrcPolicy::Warn),
            2 => Ok(CrcPolicy::Strict),
            other => Err(VaultError::Config(format!(
                "CRC level must be 0, 1 or 2, got {}",
                other
            ))),
        }
    }
}

/// Compaction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompactionMode {
    /// Build the compacted file next to the existing one, fsync, then rename over it
    #[default]
    Staged,

    /// Close, delete, pause, recreate and rewrite the file.
    /// A crash between delete and rewrite loses every collection.
    InPlace,
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Config with defaults for the given path (validated)
    pub fn for_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::builder().path(path).build()
    }
}

/// Builder for Config
pub struct ConfigBuilder {
    path: PathBuf,
    preferred_size: u32,
    crc: CrcPolicy,
    codec: Codec,
    compaction: CompactionMode,
    release_pause: Duration,
    events: Arc<dyn EventSink>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            preferred_size: DEFAULT_BLOCK_SIZE,
            crc: CrcPolicy::default(),
            codec: Codec::default(),
            compaction: CompactionMode::default(),
            release_pause: DEFAULT_RELEASE_PAUSE,
            events: Arc::new(TracingSink),
        }
    }
}

impl ConfigBuilder {
    /// Set the storage file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the preferred block size (in bytes)
    pub fn preferred_size(mut self, size: u32) -> Self {
        self.preferred_size = size;
        self
    }

    /// Set the CRC policy
    pub fn crc(mut self, policy: CrcPolicy) -> Self {
        self.crc = policy;
        self
    }

    /// Set the content codec
    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the compaction mode
    pub fn compaction(mut self, mode: CompactionMode) -> Self {
        self.compaction = mode;
        self
    }

    /// Set the pause used by in-place compaction
    pub fn release_pause(mut self, pause: Duration) -> Self {
        self.release_pause = pause;
        self
    }

    /// Set the diagnostic event sink
    pub fn events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Validate and build the config
    pub fn build(self) -> Result<Config> {
        if self.path.as_os_str().is_empty() {
            return Err(VaultError::Config("Path not provided".to_string()));
        }
        if self.preferred_size == 0 {
            return Err(VaultError::Config(
                "Preferred size must be a positive number".to_string(),
            ));
        }

        Ok(Config {
            path: self.path,
            preferred_size: self.preferred_size,
            crc: self.crc,
            codec: self.codec,
            compaction: self.compaction,
            release_pause: self.release_pause,
            events: self.events,
        })
    }
}
