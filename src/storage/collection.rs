//! Collection Store
//!
//! Per-collection write (allocate / relocate / grow) and read (locate / decode).
//!
//! ## Ordering
//! Whenever a write changes the directory (new collection, relocation or
//! in-place growth), header + payload are persisted before any data byte is
//! written, so the directory never points at a region that does not yet
//! belong to that collection.

use std::io::{Read, Seek, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::events::{emit, Severity};

use super::payload;
use super::region::{read_content, write_content, LENGTH_PREFIX_SIZE};
use super::state::{CollectionMeta, Occupant, RuntimeState};

/// Encode `records` with the configured codec and store them under `name`
pub fn write<F, T>(file: &mut F, state: &mut RuntimeState, config: &Config, name: &str, records: &T) -> Result<()>
where
    F: Read + Write + Seek,
    T: Serialize + ?Sized,
{
    let encoded = config.codec.encode(records)?;
    write_encoded(file, state, config, name, &encoded)
}

/// Store already-encoded content under `name`
pub fn write_encoded<F: Read + Write + Seek>(
    file: &mut F,
    state: &mut RuntimeState,
    config: &Config,
    name: &str,
    encoded: &[u8],
) -> Result<()> {
    let events = &*config.events;
    if i32::try_from(encoded.len()).is_err() {
        return Err(VaultError::RecordTooLarge(encoded.len()));
    }

    let capacity = state.round_up(encoded.len() as u64 + LENGTH_PREFIX_SIZE);

    // Step 1: Decide placement
    let (offset, directory_changed) = match state.position(name) {
        None => {
            let offset = state.allocate(capacity).offset();
            state.collections.push(CollectionMeta {
                name: name.to_string(),
                offset,
                capacity,
            });
            emit!(events, Severity::Debug, "Collection created", name = name, offset = offset, capacity = capacity);
            (offset, true)
        }
        Some(idx) => {
            let existing = state.collections[idx].clone();
            if state.collides(existing.offset, capacity, Occupant::Collection(name)) {
                // Allocate before releasing so the old region is never handed back to us
                let offset = state.allocate(capacity).offset();
                state.release(existing.region());
                state.collections[idx] = CollectionMeta {
                    name: existing.name,
                    offset,
                    capacity,
                };
                emit!(
                    events,
                    Severity::Debug,
                    "Collection relocated",
                    name = name,
                    from = existing.offset,
                    to = offset,
                    capacity = capacity,
                );
                (offset, true)
            } else if capacity > existing.capacity {
                state.collections[idx].capacity = capacity;
                state.cover(existing.offset, capacity);
                emit!(
                    events,
                    Severity::Debug,
                    "Collection grown in place",
                    name = name,
                    offset = existing.offset,
                    capacity = capacity,
                );
                (existing.offset, true)
            } else {
                (existing.offset, false)
            }
        }
    };

    // Step 2: Directory before data
    if directory_changed {
        payload::save(file, state, config)?;
    }

    // Step 3: Length prefix + content, zero-padded to capacity
    write_content(file, offset, encoded, capacity)?;
    emit!(events, Severity::Trace, "Collection written", name = name, length = encoded.len());

    Ok(())
}

/// Read and decode the content stored under `name`
pub fn read<F, T>(file: &mut F, state: &RuntimeState, config: &Config, name: &str) -> Result<T>
where
    F: Read + Seek,
    T: DeserializeOwned,
{
    let raw = read_raw(file, state, name)?;
    config.codec.decode(&raw)
}

/// Read the still-encoded content stored under `name`
pub fn read_raw<F: Read + Seek>(file: &mut F, state: &RuntimeState, name: &str) -> Result<Vec<u8>> {
    let meta = state
        .find(name)
        .ok_or_else(|| VaultError::CollectionNotFound(name.to_string()))?;
    read_content(file, meta)
}

/// Delete `name` from the directory and reclaim its region
pub fn remove<F: Read + Write + Seek>(file: &mut F, state: &mut RuntimeState, config: &Config, name: &str) -> Result<()> {
    let idx = state
        .position(name)
        .ok_or_else(|| VaultError::CollectionNotFound(name.to_string()))?;

    let meta = state.collections.remove(idx);
    state.release(meta.region());
    emit!(
        &*config.events,
        Severity::Debug,
        "Collection removed",
        name = name,
        offset = meta.offset,
        capacity = meta.capacity,
    );

    payload::save(file, state, config)
}
