//! Region I/O
//!
//! Positioned reads and zero-padded writes of byte regions.
//!
//! ## Collection Region Layout
//! ```text
//! ┌────────────────┬─────────────────────┬──────────────────────┐
//! │ Length (i32 LE)│ Encoded content     │ Zero padding         │
//! └────────────────┴─────────────────────┴──────────────────────┘
//! │◄──────────────────────── capacity ────────────────────────►│
//! ```

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Result, VaultError};

use super::state::CollectionMeta;

/// Size of the length prefix in front of every collection's content
pub const LENGTH_PREFIX_SIZE: u64 = 4;

/// Write `data` at `offset`, zero-padding up to `capacity`
pub fn write_region<F: Write + Seek>(file: &mut F, offset: u64, data: &[u8], capacity: u64) -> Result<()> {
    if data.len() as u64 > capacity {
        return Err(VaultError::Storage(format!(
            "Data size {} exceeds capacity {}",
            data.len(),
            capacity
        )));
    }

    let mut buf = Vec::with_capacity(capacity as usize);
    buf.extend_from_slice(data);
    buf.resize(capacity as usize, 0);

    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&buf)?;
    Ok(())
}

/// Read exactly `len` bytes at `offset`
pub fn read_at<F: Read + Seek>(file: &mut F, offset: u64, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Write length-prefixed content into a collection region of `capacity` bytes
pub fn write_content<F: Write + Seek>(file: &mut F, offset: u64, content: &[u8], capacity: u64) -> Result<()> {
    let length = i32::try_from(content.len()).map_err(|_| VaultError::RecordTooLarge(content.len()))?;

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE as usize + content.len());
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(content);

    write_region(file, offset, &buf, capacity)
}

/// Read the raw (still encoded) content of a collection
pub fn read_content<F: Read + Seek>(file: &mut F, meta: &CollectionMeta) -> Result<Vec<u8>> {
    let prefix = read_at(file, meta.offset, LENGTH_PREFIX_SIZE as usize)?;
    let length = i32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);

    let max = meta.capacity.saturating_sub(LENGTH_PREFIX_SIZE);
    if length < 0 || length as u64 > max {
        return Err(VaultError::CorruptRegion {
            name: meta.name.clone(),
            reason: format!("length prefix {} outside region of {} bytes", length, meta.capacity),
        });
    }

    read_at(file, meta.offset + LENGTH_PREFIX_SIZE, length as usize)
}
