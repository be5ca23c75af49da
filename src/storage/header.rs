//! File Header
//!
//! Fixed-size header at offset 0.
//!
//! ```text
//! ┌───────────────┬───────────────┬───────────────┬───────────────┬───────────────┬──────────┐
//! │ Version (4)   │ PayloadLen (4)│ PayloadOff (4)│ BlockSize (4) │ CRC32 (4)     │ Reserved │
//! └───────────────┴───────────────┴───────────────┴───────────────┴───────────────┴──────────┘
//!   @0              @4              @8              @12             @16             @20..64
//! ```
//!
//! All fields are little-endian u32. `PayloadOff` is relative to the end of
//! the header.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, VaultError};

/// Header size in bytes (fields + reserved space)
pub const HEADER_SIZE: u64 = 64;

/// Supported file version ("BVT1")
pub const VERSION: u32 = u32::from_le_bytes(*b"BVT1");

/// Byte offset of the CRC field
pub const CRC_OFFSET: usize = 16;

/// Upper bound on the encoded directory + free-list
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Decoded header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub payload_length: u32,
    pub payload_offset: u32,
    pub block_size: u32,
    pub crc: u32,
}

impl Header {
    /// Header for the current version with an unset CRC
    pub fn new(payload_length: u32, payload_offset: u32, block_size: u32) -> Self {
        Self {
            version: VERSION,
            payload_length,
            payload_offset,
            block_size,
            crc: 0,
        }
    }

    /// Encode to exactly [`HEADER_SIZE`] bytes (reserved space zeroed)
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE as usize);
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.payload_length);
        buf.put_u32_le(self.payload_offset);
        buf.put_u32_le(self.block_size);
        buf.put_u32_le(self.crc);
        buf.resize(HEADER_SIZE as usize, 0);
        buf.to_vec()
    }

    /// Decode header fields without validating them
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE as usize {
            return Err(VaultError::CorruptHeader(format!(
                "expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut buf = bytes;
        Ok(Self {
            version: buf.get_u32_le(),
            payload_length: buf.get_u32_le(),
            payload_offset: buf.get_u32_le(),
            block_size: buf.get_u32_le(),
            crc: buf.get_u32_le(),
        })
    }

    /// Absolute file offset where the payload starts
    pub fn payload_start(&self) -> u64 {
        HEADER_SIZE + self.payload_offset as u64
    }
}
