//! Error types for BinVault
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using VaultError
pub type Result<T> = std::result::Result<T, VaultError>;

/// Unified error type for BinVault operations
#[derive(Debug, Error)]
pub enum VaultError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Format Errors (fatal, the file is unusable)
    // -------------------------------------------------------------------------
    #[error("Unsupported file version {found:#010x} (expected {expected:#010x})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Invalid payload length: offset {offset} + length {length} exceeds {available} available bytes")]
    InvalidPayloadLength {
        offset: u64,
        length: u64,
        available: u64,
    },

    #[error("Header payload too large: {size} bytes (max {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Incomplete payload read: expected {expected} bytes, got {got}")]
    IncompletePayload { expected: usize, got: usize },

    #[error("Corrupt header: {0}")]
    CorruptHeader(String),

    #[error("Corrupt region for collection '{name}': {reason}")]
    CorruptRegion { name: String, reason: String },

    #[error("Offset {0} does not fit the header field")]
    OffsetOverflow(u64),

    #[error("Record too large: {0} encoded bytes")]
    RecordTooLarge(usize),

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Invalid CRC: stored {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch { stored: u32, computed: u32 },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    // -------------------------------------------------------------------------
    // Usage Errors
    // -------------------------------------------------------------------------
    #[error("File not open")]
    NotOpen,

    #[error("File already open")]
    AlreadyOpen,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl VaultError {
    /// True for the unrecoverable format family: the caller must treat the
    /// file as unusable.
    pub fn is_fatal_format(&self) -> bool {
        matches!(
            self,
            VaultError::UnsupportedVersion { .. }
                | VaultError::InvalidPayloadLength { .. }
                | VaultError::PayloadTooLarge { .. }
                | VaultError::IncompletePayload { .. }
                | VaultError::CorruptHeader(_)
                | VaultError::CorruptRegion { .. }
                | VaultError::OffsetOverflow(_)
                | VaultError::RecordTooLarge(_)
        )
    }
}
