//! Header Payload Codec
//!
//! Loads and persists the header together with the relocatable payload
//! (directory + free-list).
//!
//! ## Payload Document
//! ```text
//! { "c": [[name, offset, capacity], ...],   // directory
//!   "f": [[offset, capacity], ...] }        // free-list
//! ```
//! A fourth `length` element in a directory tuple is accepted and ignored.
//!
//! ## Relocation
//! When the encoded payload no longer fits where it is, saving runs as
//! "plan placement, then commit": pick a free block (first-fit) or the end of
//! file, release the old payload region, re-encode, and retry at most once
//! (falling back to the end of file, which always fits).

use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::Codec;
use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::events::{emit, Severity};
use crate::integrity;

use super::allocator::{Block, FreeList};
use super::header::{Header, HEADER_SIZE, MAX_PAYLOAD_SIZE, VERSION};
use super::region::{read_at, write_region};
use super::state::{CollectionMeta, Occupant, Placement, RuntimeState};

// =============================================================================
// Serialized Form
// =============================================================================

/// Directory tuple: `[name, offset, capacity]`
#[derive(Debug, Clone, PartialEq, Eq)]
struct DirectoryEntry {
    name: String,
    offset: u64,
    capacity: u64,
}

impl Serialize for DirectoryEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&self.name)?;
        tuple.serialize_element(&self.offset)?;
        tuple.serialize_element(&self.capacity)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for DirectoryEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntryVisitor;

        impl<'de> Visitor<'de> for EntryVisitor {
            type Value = DirectoryEntry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a [name, offset, capacity] tuple")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error> {
                let name = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let offset = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let capacity = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                // Optional cached content length
                let _length: Option<IgnoredAny> = seq.next_element()?;

                Ok(DirectoryEntry { name, offset, capacity })
            }
        }

        deserializer.deserialize_seq(EntryVisitor)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PayloadDocument {
    #[serde(default)]
    c: Vec<DirectoryEntry>,
    #[serde(default)]
    f: Vec<(u64, u64)>,
}

/// Encode a directory + free-list, enforcing the payload size limit
pub fn encode_payload(collections: &[CollectionMeta], free_list: &FreeList, codec: Codec) -> Result<Vec<u8>> {
    let document = PayloadDocument {
        c: collections
            .iter()
            .map(|c| DirectoryEntry {
                name: c.name.clone(),
                offset: c.offset,
                capacity: c.capacity,
            })
            .collect(),
        f: free_list.iter().map(|b| (b.offset, b.capacity)).collect(),
    };

    let encoded = codec.encode(&document)?;
    if encoded.len() > MAX_PAYLOAD_SIZE {
        return Err(VaultError::PayloadTooLarge {
            size: encoded.len(),
            limit: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(encoded)
}

/// Decode a payload back into directory entries and free blocks
pub fn decode_payload(bytes: &[u8], codec: Codec) -> Result<(Vec<CollectionMeta>, FreeList)> {
    let document: PayloadDocument = codec.decode(bytes)?;

    let collections = document
        .c
        .into_iter()
        .map(|e| CollectionMeta {
            name: e.name,
            offset: e.offset,
            capacity: e.capacity,
        })
        .collect();
    let free_list = FreeList::from_blocks(
        document
            .f
            .into_iter()
            .map(|(offset, capacity)| Block::new(offset, capacity))
            .collect(),
    );

    Ok((collections, free_list))
}

// =============================================================================
// Open Protocol
// =============================================================================

/// Load header and payload, bootstrapping files shorter than the header.
///
/// Steps:
/// 1. Files smaller than the header get a fresh header + empty payload
/// 2. Version must match exactly
/// 3. CRC policy is applied
/// 4. Payload bounds are validated against the file size
/// 5. The payload (if any) is decoded into the directory and free-list
pub fn load<F: Read + Write + Seek>(file: &mut F, config: &Config) -> Result<RuntimeState> {
    let events = &*config.events;
    let file_size = file.seek(SeekFrom::End(0))?;
    emit!(events, Severity::Debug, "File size", size = file_size);

    // Step 1: Bootstrap
    if file_size < HEADER_SIZE {
        emit!(events, Severity::Info, "Initializing new file header", block_size = config.preferred_size);
        let mut state = RuntimeState::empty(file_size, config.preferred_size);
        save(file, &mut state, config)?;
        return Ok(state);
    }

    // Step 2: Header + version guard
    let header = Header::decode(&read_at(file, 0, HEADER_SIZE as usize)?)?;
    if header.version != VERSION {
        emit!(events, Severity::Error, "Unsupported file version", version = header.version);
        return Err(VaultError::UnsupportedVersion {
            found: header.version,
            expected: VERSION,
        });
    }
    if header.block_size == 0 {
        return Err(VaultError::CorruptHeader("block size is zero".to_string()));
    }
    emit!(
        events,
        Severity::Debug,
        "Header read",
        payload_length = header.payload_length,
        payload_offset = header.payload_offset,
        block_size = header.block_size,
    );

    // Step 3: Integrity
    integrity::enforce(file, config.crc, events)?;

    // Step 4: Payload bounds
    let available = file_size - HEADER_SIZE;
    let end = header.payload_offset as u64 + header.payload_length as u64;
    if end > available {
        emit!(events, Severity::Error, "Invalid payload length", end = end, available = available);
        return Err(VaultError::InvalidPayloadLength {
            offset: header.payload_offset as u64,
            length: header.payload_length as u64,
            available,
        });
    }

    let mut state = RuntimeState {
        collections: Vec::new(),
        free_list: FreeList::new(),
        file_size,
        payload_length: header.payload_length,
        payload_offset: header.payload_offset,
        block_size: header.block_size,
    };

    if header.payload_length == 0 {
        emit!(events, Severity::Debug, "Empty payload");
        return Ok(state);
    }

    // Step 5: Directory + free-list
    let expected = header.payload_length as usize;
    let mut bytes = Vec::with_capacity(expected);
    file.seek(SeekFrom::Start(header.payload_start()))?;
    Read::take(&mut *file, expected as u64).read_to_end(&mut bytes)?;
    if bytes.len() < expected {
        return Err(VaultError::IncompletePayload {
            expected,
            got: bytes.len(),
        });
    }

    let (collections, free_list) = decode_payload(&bytes, config.codec)?;
    state.collections = collections;
    state.free_list = free_list;

    emit!(
        events,
        Severity::Debug,
        "Collections and free-list loaded",
        collections = state.collections.len(),
        free_blocks = state.free_list.len(),
    );

    Ok(state)
}

// =============================================================================
// Save Protocol
// =============================================================================

/// Persist header + payload, relocating the payload when it would overlap
/// another tracked region.
pub fn save<F: Read + Write + Seek>(file: &mut F, state: &mut RuntimeState, config: &Config) -> Result<()> {
    let events = &*config.events;
    let encoded = encode_payload(&state.collections, &state.free_list, config.codec)?;
    let start = HEADER_SIZE + state.payload_offset as u64;
    let rounded = state.round_up(encoded.len() as u64);

    let encoded = if state.collides(start, rounded, Occupant::Payload) {
        emit!(events, Severity::Debug, "Payload collision detected", offset = start, size = rounded);
        plan_relocation(state, rounded, config)?
    } else {
        encoded
    };

    commit(file, state, &encoded, config)
}

/// Choose a new payload position and release the old one.
///
/// Returns the payload encoded against the final free-list.
fn plan_relocation(state: &mut RuntimeState, needed: u64, config: &Config) -> Result<Vec<u8>> {
    let events = &*config.events;
    let previous = state.payload_region();

    let placement = state.allocate(needed);
    state.release(previous);

    // Releasing the old region changed the free-list, so re-encode
    let mut encoded = encode_payload(&state.collections, &state.free_list, config.codec)?;
    let target = match placement {
        Placement::Reused(block) if state.round_up(encoded.len() as u64) <= block.capacity => block.offset,
        Placement::Reused(block) => {
            // Single retry: hand the block back and append, which always fits
            state.release(block);
            encoded = encode_payload(&state.collections, &state.free_list, config.codec)?;
            let offset = state.file_size;
            state.file_size += state.round_up(encoded.len() as u64);
            offset
        }
        Placement::Appended(offset) => {
            // Size the tail to the final encoding
            state.file_size = offset + state.round_up(encoded.len() as u64);
            offset
        }
    };

    state.payload_offset = u32::try_from(target - HEADER_SIZE).map_err(|_| VaultError::OffsetOverflow(target))?;
    emit!(
        events,
        Severity::Debug,
        "Payload relocated",
        from = previous.offset,
        to = target,
        reused = matches!(placement, Placement::Reused(_)),
    );

    Ok(encoded)
}

/// Write header, then the payload padded to its block-aligned capacity
fn commit<F: Read + Write + Seek>(file: &mut F, state: &mut RuntimeState, encoded: &[u8], config: &Config) -> Result<()> {
    let events = &*config.events;
    let length = encoded.len() as u32;
    let header = Header::new(length, state.payload_offset, state.block_size);

    file.seek(SeekFrom::Start(0))?;
    file.write_all(&header.encode())?;

    let start = header.payload_start();
    let capacity = state.round_up(encoded.len() as u64);
    write_region(file, start, encoded, capacity)?;

    state.payload_length = length;
    state.cover(start, capacity);
    emit!(events, Severity::Trace, "Payload written", offset = start, length = length, capacity = capacity);

    if config.crc.is_enabled() {
        let crc = integrity::stamp_crc(file)?;
        emit!(events, Severity::Trace, "CRC stamped", crc = format!("{:#010x}", crc));
    }

    Ok(())
}
