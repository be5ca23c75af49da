//! Integrity Checker
//!
//! Whole-file CRC32 computation and verification.
//!
//! ## Responsibilities
//! - Standard reflected CRC-32 (polynomial 0xEDB88320)
//! - Whole-file CRC with the header's CRC field zeroed
//! - Applying the configured [`CrcPolicy`] on open
//!
//! A stored CRC of zero means "not set": it only ever produces a warning.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::config::CrcPolicy;
use crate::error::{Result, VaultError};
use crate::events::{emit, EventSink, Severity};
use crate::storage::header::{CRC_OFFSET, HEADER_SIZE};

/// Default seed, equivalent to starting a fresh CRC
pub const DEFAULT_SEED: u32 = 0xFFFF_FFFF;

/// CRC32 of `bytes` using the default seed
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32_with_seed(bytes, DEFAULT_SEED)
}

/// CRC32 of `bytes` continuing from `seed`.
///
/// The seed is the initial CRC register: `DEFAULT_SEED` starts fresh,
/// and `!crc32(a)` continues a previous computation over `a`.
///
/// Legacy files whose register started at `seed ^ 0xFFFF_FFFF` produce
/// different values and fail a strict check.
pub fn crc32_with_seed(bytes: &[u8], seed: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(seed ^ 0xFFFF_FFFF);
    hasher.update(bytes);
    hasher.finalize()
}

/// Stored and recomputed CRC of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCrc {
    /// Value found in the header's CRC field
    pub stored: u32,
    /// CRC32 of the file with the CRC field zeroed
    pub computed: u32,
}

impl FileCrc {
    /// Whether the stored value is "not set"
    pub fn is_unset(&self) -> bool {
        self.stored == 0
    }

    /// Matches, or nothing was stored
    pub fn is_valid(&self) -> bool {
        self.is_unset() || self.stored == self.computed
    }
}

/// Compute the stored and actual CRC of a whole file.
///
/// Files shorter than the header yield `{ stored: 0, computed: 0 }`.
pub fn file_crc<F: Read + Seek>(file: &mut F) -> Result<FileCrc> {
    let size = file.seek(SeekFrom::End(0))?;
    if size < HEADER_SIZE {
        return Ok(FileCrc { stored: 0, computed: 0 });
    }

    let mut buffer = vec![0u8; size as usize];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut buffer)?;

    let field = CRC_OFFSET..CRC_OFFSET + 4;
    let mut stored = [0u8; 4];
    stored.copy_from_slice(&buffer[field.clone()]);
    buffer[field].fill(0);

    Ok(FileCrc {
        stored: u32::from_le_bytes(stored),
        computed: crc32(&buffer),
    })
}

/// Recompute the file CRC and write it into the header's CRC field.
///
/// Returns the stamped value. Does nothing for files shorter than the header.
pub fn stamp_crc<F: Read + Write + Seek>(file: &mut F) -> Result<u32> {
    let size = file.seek(SeekFrom::End(0))?;
    if size < HEADER_SIZE {
        return Ok(0);
    }

    let crc = file_crc(file)?.computed;
    file.seek(SeekFrom::Start(CRC_OFFSET as u64))?;
    file.write_all(&crc.to_le_bytes())?;
    Ok(crc)
}

/// Check a file's CRC against the policy.
///
/// - `Disabled`: the stored value is never read
/// - `Warn`: a mismatch is logged, open proceeds
/// - `Strict`: a mismatch fails with [`VaultError::CrcMismatch`]
pub fn enforce<F: Read + Seek>(
    file: &mut F,
    policy: CrcPolicy,
    events: &dyn EventSink,
) -> Result<Option<FileCrc>> {
    if !policy.is_enabled() {
        return Ok(None);
    }

    let crc = file_crc(file)?;
    emit!(
        events,
        Severity::Debug,
        "CRC checked",
        stored = format!("{:#010x}", crc.stored),
        computed = format!("{:#010x}", crc.computed),
        valid = crc.is_valid(),
    );

    if crc.is_unset() {
        emit!(events, Severity::Warn, "CRC is zero, CRC will not be checked");
        return Ok(Some(crc));
    }

    if crc.stored != crc.computed {
        emit!(
            events,
            Severity::Error,
            "Invalid CRC",
            stored = format!("{:#010x}", crc.stored),
            computed = format!("{:#010x}", crc.computed),
            policy = policy.level(),
        );
        if policy == CrcPolicy::Strict {
            return Err(VaultError::CrcMismatch {
                stored: crc.stored,
                computed: crc.computed,
            });
        }
    }

    Ok(Some(crc))
}
