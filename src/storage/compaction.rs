//! Compaction Engine
//!
//! Rewrites the file so every collection sits back to back with a capacity
//! matching its content, and the free-list is empty.
//!
//! ## Layout After Compaction
//! ```text
//! ┌────────┬──────────┬─────┬──────────────┬──────────────┬─────┐
//! │ Header │ Payload  │ gap │ Collection 1 │ Collection 2 │ ... │
//! └────────┴──────────┴─────┴──────────────┴──────────────┴─────┘
//!                      one block of headroom for the payload
//! ```

use std::fs::{self, File};
use std::io::{Read, Seek, Write};
use std::path::Path;
use std::thread;

use tempfile::NamedTempFile;

use crate::codec::Codec;
use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::events::{emit, Severity};

use super::header::HEADER_SIZE;
use super::open_file;
use super::payload;
use super::region::{read_content, write_content, LENGTH_PREFIX_SIZE};
use super::state::{CollectionMeta, RuntimeState};

/// Raw content of one collection, keyed by name
pub type Snapshot = Vec<(String, Vec<u8>)>;

/// Read every live collection's encoded content, in directory order
pub fn snapshot<F: Read + Seek>(file: &mut F, state: &RuntimeState) -> Result<Snapshot> {
    state
        .collections
        .iter()
        .map(|meta| -> Result<(String, Vec<u8>)> { Ok((meta.name.clone(), read_content(file, meta)?)) })
        .collect()
}

/// Lay out `contents` back to back after the payload.
///
/// Starts one block past the current payload and moves further out until
/// the encoded directory of the final layout fits in front of the first
/// collection.
pub fn plan_layout(base: &RuntimeState, contents: &Snapshot, codec: Codec) -> Result<Vec<CollectionMeta>> {
    let block = base.block_size as u64;
    let mut start = base.round_up(HEADER_SIZE + base.payload_length as u64) + block;

    loop {
        let mut cursor = start;
        let layout: Vec<CollectionMeta> = contents
            .iter()
            .map(|(name, bytes)| {
                let capacity = base.round_up(bytes.len() as u64 + LENGTH_PREFIX_SIZE);
                let meta = CollectionMeta {
                    name: name.clone(),
                    offset: cursor,
                    capacity,
                };
                cursor += capacity;
                meta
            })
            .collect();

        let encoded = payload::encode_payload(&layout, &base.free_list, codec)?;
        let payload_end = HEADER_SIZE + base.round_up(encoded.len() as u64);
        if payload_end <= start {
            return Ok(layout);
        }
        start = base.round_up(payload_end) + block;
    }
}

/// Write `contents` into a freshly bootstrapped file and persist the directory once
pub fn rebuild<F: Read + Write + Seek>(
    file: &mut F,
    state: &mut RuntimeState,
    config: &Config,
    contents: &Snapshot,
) -> Result<()> {
    let layout = plan_layout(state, contents, config.codec)?;

    for (meta, (_, bytes)) in layout.iter().zip(contents) {
        write_content(file, meta.offset, bytes, meta.capacity)?;
        state.cover(meta.offset, meta.capacity);
    }
    state.collections = layout;

    payload::save(file, state, config)
}

/// Build the compacted file beside `path`, fsync it, then rename it over `path`.
///
/// The existing file stays untouched until the rename.
pub fn compact_staged(path: &Path, contents: &Snapshot, config: &Config) -> Result<(File, RuntimeState)> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir)?;
    let mut state = payload::load(staged.as_file_mut(), config)?;
    rebuild(staged.as_file_mut(), &mut state, config, contents)?;
    staged.as_file().sync_all()?;

    // Temp files are created owner-only; keep the existing mode
    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(staged.path(), metadata.permissions())?;
    }

    let file = staged.persist(path).map_err(|e| VaultError::Io(e.error))?;
    emit!(
        &*config.events,
        Severity::Info,
        "Compaction complete",
        mode = "staged",
        collections = state.collections.len(),
        file_size = state.file_size,
    );

    Ok((file, state))
}

/// Delete `path`, pause, recreate it and rewrite `contents`.
///
/// The caller must have released its handle. A crash before the rewrite
/// finishes loses every collection.
pub fn compact_in_place(path: &Path, contents: &Snapshot, config: &Config) -> Result<(File, RuntimeState)> {
    fs::remove_file(path)?;
    thread::sleep(config.release_pause);

    let mut file = open_file(path)?;
    let mut state = payload::load(&mut file, config)?;
    rebuild(&mut file, &mut state, config, contents)?;
    file.sync_all()?;

    emit!(
        &*config.events,
        Severity::Info,
        "Compaction complete",
        mode = "in-place",
        collections = state.collections.len(),
        file_size = state.file_size,
    );

    Ok((file, state))
}
