//! Block and slot allocation
//!
//! Blocks are handed out first-fit from the bitmap, slots first-fit from the
//! record table. The capacity record's counters are a cache of those two
//! structures; [`reconcile`] resynchronises the cache when it has drifted.

pub mod bitmap;

use crate::catalog::RecordTable;
use crate::error::Result;
use crate::layout::CapacityRecord;

/// Block allocator trait
///
/// Defines the interface for allocating and freeing blocks in the image.
pub trait BlockAllocator {
    /// Allocate the lowest-indexed free block
    fn allocate(&mut self) -> Result<u32>;

    /// Free previously allocated blocks, returning how many were actually held
    fn free(&mut self, blocks: &[u32]) -> Result<usize>;

    /// Get number of free blocks available
    fn free_blocks(&self) -> usize;
}

/// First unused record table slot
pub fn find_free_slot(table: &RecordTable) -> Option<usize> {
    table.records().iter().position(|record| !record.used)
}

/// Overwrite the cached free block count with the allocator's true count
///
/// This is a heuristic repair: it trusts the allocator and cannot detect a
/// corrupted bitmap. Returns `true` if the cache had drifted.
pub fn reconcile<A: BlockAllocator>(capacity: &mut CapacityRecord, allocator: &A) -> bool {
    let actual = allocator.free_blocks() as i32;
    if capacity.free_blocks == actual {
        return false;
    }

    tracing::warn!(
        cached = capacity.free_blocks,
        actual,
        "Free block count drifted from bitmap, reconciling"
    );
    capacity.free_blocks = actual;
    true
}

/// Overwrite the cached free slot count with the table's true count
pub fn reconcile_slots(capacity: &mut CapacityRecord, table: &RecordTable) -> bool {
    let actual = table.free_count() as i32;
    if capacity.free_slots == actual {
        return false;
    }

    tracing::warn!(
        cached = capacity.free_slots,
        actual,
        "Free slot count drifted from record table, reconciling"
    );
    capacity.free_slots = actual;
    true
}
