//! Tests for the Collection Store
//!
//! These tests verify:
//! - Placement of new collections (append / free-list reuse)
//! - Relocation on growth and in-place growth
//! - Neighbouring collections survive every write
//! - Header payload relocation as the directory grows
//! - Payload relocation into a free block, and the end-of-file fallback
//! - Regions stay pairwise disjoint across random operation sequences,
//!   compaction included

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use binvault::storage::{payload, Block, CollectionMeta, FreeList, RuntimeState};
use binvault::{Codec, Config, CrcPolicy, NullSink, StorageManager, VaultError};
use proptest::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_file() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.bv");
    (temp_dir, path)
}

fn json_config(path: &Path) -> Config {
    Config::builder()
        .path(path)
        .codec(Codec::Json)
        .crc(CrcPolicy::Disabled)
        .build()
        .unwrap()
}

fn open(path: &Path) -> StorageManager {
    StorageManager::open_with(json_config(path)).unwrap()
}

/// One record whose JSON encoding is `len + 4` bytes (`["xxx..."]`)
fn blob(len: usize) -> Vec<Value> {
    vec![json!("x".repeat(len))]
}

fn small() -> Vec<Value> {
    vec![json!({"id": 1})]
}

/// Every tracked region, sorted by offset
fn regions(state: &RuntimeState) -> Vec<(String, Block)> {
    let mut regions: Vec<(String, Block)> = state
        .collections
        .iter()
        .map(|c| (c.name.clone(), c.region()))
        .collect();
    regions.push(("<payload>".to_string(), state.payload_region()));
    regions.extend(state.free_list.iter().map(|b| ("<free>".to_string(), *b)));
    regions.sort_by_key(|(_, b)| b.offset);
    regions
}

fn assert_layout_valid(state: &RuntimeState) {
    let regions = regions(state);
    for pair in regions.windows(2) {
        assert!(
            pair[0].1.end() <= pair[1].1.offset,
            "{} {:?} overlaps {} {:?}",
            pair[0].0,
            pair[0].1,
            pair[1].0,
            pair[1].1
        );
    }
    for (name, block) in &regions {
        assert!(block.offset >= 64, "{} starts inside the header", name);
        assert!(block.end() <= state.file_size, "{} extends past end of file", name);
        assert_eq!(block.capacity % state.block_size as u64, 0, "{} is not block aligned", name);
    }
}

fn offset_of(db: &StorageManager, name: &str) -> (u64, u64) {
    let meta = db.state().unwrap().find(name).unwrap().clone();
    (meta.offset, meta.capacity)
}

// =============================================================================
// Placement Tests
// =============================================================================

#[test]
fn test_new_collections_append_after_payload() {
    let (_temp, path) = setup_temp_file();
    let mut db = open(&path);

    db.write("a", &small()).unwrap();
    db.write("b", &small()).unwrap();

    assert_eq!(offset_of(&db, "a"), (320, 256));
    assert_eq!(offset_of(&db, "b"), (576, 256));
    assert_eq!(db.state().unwrap().file_size, 832);
    assert_layout_valid(db.state().unwrap());
}

#[test]
fn test_growth_relocates_and_frees_old_region() {
    let (_temp, path) = setup_temp_file();
    let mut db = open(&path);

    db.write("a", &small()).unwrap();
    db.write("b", &small()).unwrap();
    db.write("a", &blob(600)).unwrap();

    let state = db.state().unwrap();
    assert_eq!(offset_of(&db, "a"), (832, 768));
    assert_eq!(state.free_list.blocks(), &[Block::new(320, 256)]);
    assert_eq!(state.file_size, 1600);
    assert_layout_valid(state);

    // Neighbour untouched
    assert_eq!(db.read("b").unwrap(), small());
    assert_eq!(db.read("a").unwrap(), blob(600));
}

#[test]
fn test_new_collection_reuses_freed_block() {
    let (_temp, path) = setup_temp_file();
    let mut db = open(&path);

    db.write("a", &small()).unwrap();
    db.write("b", &small()).unwrap();
    db.write("a", &blob(600)).unwrap();
    db.write("c", &small()).unwrap();

    assert_eq!(offset_of(&db, "c"), (320, 256));
    let state = db.state().unwrap();
    assert!(state.free_list.is_empty());
    assert_eq!(state.file_size, 1600);
    assert_layout_valid(state);
}

#[test]
fn test_oversized_free_block_consumed_whole() {
    let (_temp, path) = setup_temp_file();
    let mut db = open(&path);

    db.write("big", &blob(600)).unwrap();
    db.write("keep", &small()).unwrap();
    assert_eq!(offset_of(&db, "big"), (320, 768));
    assert_eq!(offset_of(&db, "keep"), (1088, 256));

    db.remove_collection("big").unwrap();
    assert_eq!(db.state().unwrap().free_list.blocks(), &[Block::new(320, 768)]);

    db.write("tiny", &small()).unwrap();
    assert_eq!(offset_of(&db, "tiny"), (320, 256));
    assert!(db.state().unwrap().free_list.is_empty());
    assert_layout_valid(db.state().unwrap());
}

#[test]
fn test_growth_in_place_at_end_of_file() {
    let (_temp, path) = setup_temp_file();
    let mut db = open(&path);

    db.write("only", &small()).unwrap();
    db.write("only", &blob(1000)).unwrap();

    assert_eq!(offset_of(&db, "only"), (320, 1024));
    assert_eq!(db.state().unwrap().file_size, 1344);
    assert_eq!(db.read("only").unwrap(), blob(1000));

    // Directory already records the grown capacity on disk
    db.close().unwrap();
    let db = open(&path);
    assert_eq!(offset_of(&db, "only"), (320, 1024));
}

#[test]
fn test_shrinking_write_keeps_capacity() {
    let (_temp, path) = setup_temp_file();
    let mut db = open(&path);

    db.write("a", &blob(600)).unwrap();
    db.write("a", &small()).unwrap();

    assert_eq!(offset_of(&db, "a"), (320, 768));
    assert_eq!(db.read("a").unwrap(), small());
}

#[test]
fn test_empty_records_round_trip() {
    let (_temp, path) = setup_temp_file();
    let mut db = open(&path);

    db.write("empty", &[]).unwrap();
    assert_eq!(db.read("empty").unwrap(), Vec::<Value>::new());
    assert_eq!(offset_of(&db, "empty"), (320, 256));
}

#[test]
fn test_read_missing_collection() {
    let (_temp, path) = setup_temp_file();
    let mut db = open(&path);

    let err = db.read("nothing").unwrap_err();
    assert!(matches!(err, VaultError::CollectionNotFound(name) if name == "nothing"));
}

#[test]
fn test_remove_missing_collection() {
    let (_temp, path) = setup_temp_file();
    let mut db = open(&path);

    let result = db.remove_collection("nothing");
    assert!(matches!(result, Err(VaultError::CollectionNotFound(_))));
}

#[test]
fn test_remove_then_recreate() {
    let (_temp, path) = setup_temp_file();
    let mut db = open(&path);

    db.write("a", &small()).unwrap();
    db.remove_collection("a").unwrap();
    assert!(!db.has_collection("a").unwrap());

    db.write("a", &[json!(2)]).unwrap();
    assert_eq!(db.read("a").unwrap(), vec![json!(2)]);
    assert_layout_valid(db.state().unwrap());
}

#[test]
fn test_corrupt_length_prefix_detected() {
    let (_temp, path) = setup_temp_file();
    let mut db = open(&path);
    db.write("a", &small()).unwrap();
    db.close().unwrap();

    // Length prefix larger than the region
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[320..324].copy_from_slice(&10_000i32.to_le_bytes());
    std::fs::write(&path, bytes).unwrap();

    let mut db = open(&path);
    let result = db.read("a");
    assert!(matches!(result, Err(VaultError::CorruptRegion { .. })));
}

// =============================================================================
// Payload Relocation Tests
// =============================================================================

#[test]
fn test_payload_relocates_as_directory_grows() {
    let (_temp, path) = setup_temp_file();
    let mut db = open(&path);

    for i in 0..30 {
        let name = format!("collection_{:02}", i);
        db.write(&name, &[json!({"n": i})]).unwrap();
        assert_layout_valid(db.state().unwrap());
    }

    let state = db.state().unwrap();
    assert_ne!(state.payload_offset, 0, "payload should have left its first slot");
    assert!(state.payload_length > 256);

    for i in 0..30 {
        let name = format!("collection_{:02}", i);
        assert_eq!(db.read(&name).unwrap(), vec![json!({"n": i})]);
    }

    let before = db.state().unwrap().clone();
    db.close().unwrap();

    let db = open(&path);
    assert_eq!(db.state().unwrap(), &before);
}

#[test]
fn test_reopen_reproduces_state() {
    let (_temp, path) = setup_temp_file();
    let mut db = open(&path);

    db.write("a", &small()).unwrap();
    db.write("b", &blob(300)).unwrap();
    db.write("a", &blob(900)).unwrap();
    db.remove_collection("b").unwrap();
    db.write("c", &small()).unwrap();

    let before = db.state().unwrap().clone();
    db.close().unwrap();

    let mut db = open(&path);
    assert_eq!(db.state().unwrap(), &before);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), before.file_size);
    assert_eq!(db.read("a").unwrap(), blob(900));
    assert_eq!(db.read("c").unwrap(), small());
}

/// Block size 8, JSON directory. The payload sits at 10000 (16 bytes) with
/// collection `name` right behind it at 10016, and one free block at 200.
fn relocation_state(name: &str) -> RuntimeState {
    RuntimeState {
        collections: vec![CollectionMeta {
            name: name.to_string(),
            offset: 10016,
            capacity: 8,
        }],
        free_list: FreeList::from_blocks(vec![Block::new(200, 40)]),
        file_size: 10024,
        payload_length: 12,
        payload_offset: 10000 - 64,
        block_size: 8,
    }
}

fn relocation_config() -> Config {
    Config::builder()
        .path("unused.bv")
        .codec(Codec::Json)
        .crc(CrcPolicy::Disabled)
        .events(Arc::new(NullSink))
        .build()
        .unwrap()
}

#[test]
fn test_payload_moves_into_free_block() {
    let config = relocation_config();
    let mut file = Cursor::new(vec![0u8; 10024]);

    // {"c":[["a",10016,8]],"f":[[200,40]]} is 36 bytes: outgrows its 16-byte
    // slot and fits the 40-byte free block, also after the old slot is freed
    let mut state = relocation_state("a");
    payload::save(&mut file, &mut state, &config).unwrap();

    assert_eq!(state.payload_offset as u64 + 64, 200);
    assert_eq!(state.free_list.blocks(), &[Block::new(10000, 16)]);
    assert_eq!(state.file_size, 10024);
    assert_layout_valid(&state);

    let loaded = payload::load(&mut file, &config).unwrap();
    assert_eq!(loaded, state);
}

#[test]
fn test_payload_falls_back_to_end_of_file() {
    let config = relocation_config();
    let mut file = Cursor::new(vec![0u8; 10024]);

    // 39 bytes fit the 40-byte free block, but freeing the old slot at 10000
    // makes the directory 41 bytes (48 rounded), so the block goes back and
    // the payload is appended instead
    let mut state = relocation_state("abcd");
    payload::save(&mut file, &mut state, &config).unwrap();

    assert_eq!(state.payload_offset as u64 + 64, 10024);
    assert_eq!(state.free_list.blocks(), &[Block::new(200, 40), Block::new(10000, 16)]);
    assert_eq!(state.payload_length, 50);
    assert_eq!(state.file_size, 10080);
    assert_layout_valid(&state);

    let loaded = payload::load(&mut file, &config).unwrap();
    assert_eq!(loaded, state);
    assert_eq!(file.get_ref().len() as u64, state.file_size);
}

// =============================================================================
// Property Tests
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Write(usize, usize),
    Remove(usize),
    Reopen,
    Optimize,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0usize..5, 0usize..400).prop_map(|(name, len)| Op::Write(name, len)),
        2 => (0usize..5).prop_map(Op::Remove),
        1 => Just(Op::Reopen),
        1 => Just(Op::Optimize),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_operations_keep_regions_disjoint(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let (_temp, path) = setup_temp_file();
        let config = Config::builder()
            .path(&path)
            .preferred_size(64)
            .crc(CrcPolicy::Disabled)
            .build()
            .unwrap();
        let mut db = StorageManager::open_with(config.clone()).unwrap();
        let mut model: BTreeMap<String, Vec<Value>> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Write(name, len) => {
                    let name = format!("c{}", name);
                    let records = blob(len);
                    db.write(&name, &records).unwrap();
                    model.insert(name, records);
                }
                Op::Remove(name) => {
                    let name = format!("c{}", name);
                    let result = db.remove_collection(&name);
                    prop_assert_eq!(result.is_ok(), model.remove(&name).is_some());
                }
                Op::Optimize => {
                    db.optimize().unwrap();
                    let state = db.state().unwrap();
                    prop_assert!(state.free_list.is_empty());
                    prop_assert_eq!(state.collections.len(), model.len());
                }
                Op::Reopen => {
                    let before = db.state().unwrap().clone();
                    db.close().unwrap();
                    db = StorageManager::open_with(config.clone()).unwrap();
                    prop_assert_eq!(db.state().unwrap(), &before);
                }
            }

            assert_layout_valid(db.state().unwrap());
        }

        prop_assert_eq!(db.collections().unwrap().len(), model.len());
        for (name, records) in &model {
            prop_assert_eq!(&db.read(name).unwrap(), records);
        }
    }
}
