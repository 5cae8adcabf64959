//! Read-only consistency scan of an attached image
//!
//! Attach only performs the cheap structural checks. This scan cross-checks
//! the record table against the bitmap and the capacity record and reports
//! what it finds without repairing anything.

use crate::allocator::bitmap::FreeBitmap;
use crate::catalog::RecordTable;
use crate::error::Result;
use crate::layout::{CapacityRecord, DATA_START, TOTAL_BLOCKS};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A cached counter that disagrees with the structure it summarises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDrift {
    pub cached: i32,
    pub actual: i32,
}

/// Findings of [`scan`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    /// Blocks referenced by more than one used record
    pub shared_blocks: Vec<u32>,

    /// Blocks referenced by a record whose bitmap bit is clear
    pub unmarked_blocks: Vec<u32>,

    /// Data blocks marked used that no record references
    pub leaked_blocks: Vec<u32>,

    /// Names of records whose size disagrees with their block count
    pub inconsistent_records: Vec<String>,

    /// Names held by more than one used record
    pub duplicate_names: Vec<String>,

    /// `free_blocks` versus the bitmap
    pub block_drift: Option<CounterDrift>,

    /// `free_slots` versus the record table
    pub slot_drift: Option<CounterDrift>,
}

impl CheckReport {
    /// No findings at all
    pub fn is_clean(&self) -> bool {
        self.shared_blocks.is_empty()
            && self.unmarked_blocks.is_empty()
            && self.leaked_blocks.is_empty()
            && self.inconsistent_records.is_empty()
            && self.duplicate_names.is_empty()
            && self.block_drift.is_none()
            && self.slot_drift.is_none()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Cross-check the three metadata structures
pub fn scan(capacity: &CapacityRecord, bitmap: &FreeBitmap, table: &RecordTable) -> CheckReport {
    let mut report = CheckReport::default();
    let mut owners: HashMap<u32, usize> = HashMap::new();
    let mut names: HashSet<&str> = HashSet::new();

    for (_, record) in table.iter_used() {
        if !names.insert(record.name.as_str())
            && !report.duplicate_names.contains(&record.name)
        {
            report.duplicate_names.push(record.name.clone());
        }

        if !record.is_consistent() {
            report.inconsistent_records.push(record.name.clone());
        }

        for block in record.allocated_blocks() {
            *owners.entry(block).or_insert(0) += 1;
            if !bitmap.is_allocated(block as usize) && !report.unmarked_blocks.contains(&block) {
                report.unmarked_blocks.push(block);
            }
        }
    }

    report.shared_blocks = owners
        .iter()
        .filter(|&(_, &count)| count > 1)
        .map(|(&block, _)| block)
        .collect();
    report.shared_blocks.sort_unstable();
    report.unmarked_blocks.sort_unstable();

    report.leaked_blocks = (DATA_START..TOTAL_BLOCKS)
        .filter(|&block| bitmap.is_allocated(block) && !owners.contains_key(&(block as u32)))
        .map(|block| block as u32)
        .collect();

    let actual_free = bitmap.count_free() as i32;
    if capacity.free_blocks != actual_free {
        report.block_drift = Some(CounterDrift {
            cached: capacity.free_blocks,
            actual: actual_free,
        });
    }

    let actual_slots = table.free_count() as i32;
    if capacity.free_slots != actual_slots {
        report.slot_drift = Some(CounterDrift {
            cached: capacity.free_slots,
            actual: actual_slots,
        });
    }

    report
}
