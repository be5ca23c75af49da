//! Tests for the Block Allocator
//!
//! These tests verify:
//! - Capacity rounding
//! - First-fit selection without splitting
//! - Free-list insertion rounding and coalescing
//! - Interval collision detection

use binvault::storage::allocator::collides;
use binvault::storage::{round_up, Block, FreeList};
use proptest::prelude::*;

// =============================================================================
// Rounding Tests
// =============================================================================

#[test]
fn test_round_up_multiples() {
    assert_eq!(round_up(0, 64), 0);
    assert_eq!(round_up(4, 64), 64);
    assert_eq!(round_up(64, 64), 64);
    assert_eq!(round_up(65, 64), 128);
    assert_eq!(round_up(1000, 256), 1024);
}

// =============================================================================
// First-Fit Tests
// =============================================================================

#[test]
fn test_first_fit_takes_first_large_enough_block() {
    let mut free = FreeList::from_blocks(vec![
        Block::new(100, 64),
        Block::new(1000, 512),
        Block::new(2000, 256),
    ]);

    // The 512 block comes first in list order even though 256 fits better
    let block = free.take_first_fit(200).unwrap();
    assert_eq!(block, Block::new(1000, 512));
    assert_eq!(free.blocks(), &[Block::new(100, 64), Block::new(2000, 256)]);
}

#[test]
fn test_first_fit_consumes_block_whole() {
    let mut free = FreeList::new();
    free.push(0, 1024, 256);

    let block = free.take_first_fit(256).unwrap();
    assert_eq!(block.capacity, 1024);
    assert!(free.is_empty());
}

#[test]
fn test_first_fit_none_when_nothing_fits() {
    let mut free = FreeList::from_blocks(vec![Block::new(0, 256)]);
    assert!(free.take_first_fit(512).is_none());
    assert_eq!(free.len(), 1);
}

// =============================================================================
// Push / Coalesce Tests
// =============================================================================

#[test]
fn test_push_rounds_up_length() {
    let mut free = FreeList::new();
    free.push(512, 10, 256);

    assert_eq!(free.blocks(), &[Block::new(512, 256)]);
}

#[test]
fn test_push_ignores_zero_length() {
    let mut free = FreeList::new();
    free.push(512, 0, 256);

    assert!(free.is_empty());
}

#[test]
fn test_push_merges_adjacent_blocks() {
    let mut free = FreeList::new();
    free.push(1024, 256, 256);
    free.push(512, 256, 256);
    assert_eq!(free.len(), 2);

    // Fills the gap, all three become one
    free.push(768, 256, 256);
    assert_eq!(free.blocks(), &[Block::new(512, 768)]);
    assert_eq!(free.total_bytes(), 768);
}

#[test]
fn test_push_keeps_sorted_order() {
    let mut free = FreeList::new();
    free.push(3000, 256, 256);
    free.push(100, 256, 256);
    free.push(1500, 256, 256);

    let offsets: Vec<u64> = free.iter().map(|b| b.offset).collect();
    assert_eq!(offsets, vec![100, 1500, 3000]);
}

#[test]
fn test_push_merges_overlapping_blocks() {
    let mut free = FreeList::new();
    free.push(0, 512, 256);
    free.push(256, 512, 256);

    assert_eq!(free.blocks(), &[Block::new(0, 768)]);
}

// =============================================================================
// Collision Tests
// =============================================================================

#[test]
fn test_collides_half_open_ranges() {
    let extents = [Block::new(100, 100), Block::new(300, 100)];

    assert!(collides(extents, 150, 10));
    assert!(collides(extents, 50, 51));
    assert!(!collides(extents, 200, 100));
    assert!(!collides(extents, 50, 50));
    assert!(!collides(extents, 400, 1000));
}

#[test]
fn test_collides_ignores_empty_candidate() {
    let extents = [Block::new(100, 100)];
    assert!(!collides(extents, 150, 0));
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #[test]
    fn prop_free_list_never_has_touching_blocks(
        slots in proptest::collection::vec((0u64..64, 1u64..4), 1..40)
    ) {
        let block_size = 64u32;
        let mut free = FreeList::new();
        let mut expected_bytes = std::collections::BTreeSet::new();

        for (slot, blocks) in slots {
            let offset = slot * block_size as u64;
            let len = blocks * block_size as u64;
            free.push(offset, len, block_size);
            for b in 0..blocks {
                expected_bytes.insert(slot + b);
            }
        }

        let list = free.blocks();
        for pair in list.windows(2) {
            // Sorted with a gap between every pair
            prop_assert!(pair[0].end() < pair[1].offset);
        }
        for block in list {
            prop_assert_eq!(block.offset % block_size as u64, 0);
            prop_assert_eq!(block.capacity % block_size as u64, 0);
        }
        prop_assert_eq!(free.total_bytes(), expected_bytes.len() as u64 * block_size as u64);
    }
}
