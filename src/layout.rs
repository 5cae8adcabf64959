//! On-disk geometry and the capacity record (block 0)
//!
//! The image layout is fixed regardless of host:
//!
//! ```text
//! block 0        capacity record
//! block 1        free-space bitmap (one bit per block, 320 bytes used)
//! blocks 2-9     record table (256 entries x 128 bytes)
//! blocks 10-2559 data region
//! ```

use crate::error::{FsError, Result};
use serde::{Deserialize, Serialize};

/// Size of every block in bytes
pub const BLOCK_SIZE: usize = 4096;

/// Total number of blocks in the image, metadata included
pub const TOTAL_BLOCKS: usize = 2560;

/// Total image size in bytes (10 MiB)
pub const IMAGE_SIZE: u64 = (TOTAL_BLOCKS * BLOCK_SIZE) as u64;

pub const CAPACITY_BLOCK: usize = 0;
pub const BITMAP_BLOCK: usize = 1;
pub const RECORD_TABLE_START: usize = 2;
pub const RECORD_TABLE_BLOCKS: usize = 8;

/// First block of the data region; everything below is metadata
pub const DATA_START: usize = RECORD_TABLE_START + RECORD_TABLE_BLOCKS;

/// Number of allocatable data blocks
pub const DATA_BLOCKS: usize = TOTAL_BLOCKS - DATA_START;

/// Bytes of the bitmap actually in use
pub const BITMAP_BYTES: usize = TOTAL_BLOCKS / 8;

/// Number of record table entries (maximum number of files)
pub const MAX_FILES: usize = 256;

/// On-disk size of one record table entry
pub const RECORD_SIZE: usize = 128;

/// Maximum file name length in bytes
pub const MAX_NAME_LEN: usize = 28;

/// Direct block slots per record
pub const MAX_DIRECT_BLOCKS: usize = 12;

/// Largest file the direct block list can address
pub const MAX_FILE_SIZE: usize = MAX_DIRECT_BLOCKS * BLOCK_SIZE;

const CAPACITY_RECORD_LEN: usize = 5 * 4;

/// Capacity record (superblock)
///
/// Totals are fixed at format time and re-verified at attach time. The two
/// free counters are live: `free_blocks` is a cache of the bitmap's zero bits
/// in the data region and may drift; the allocator reconciles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityRecord {
    /// Total number of blocks in the image (2560)
    pub total_blocks: i32,

    /// Block size in bytes (4096)
    pub block_size: i32,

    /// Unallocated data blocks
    pub free_blocks: i32,

    /// Record table entries (256)
    pub total_slots: i32,

    /// Unused record table entries
    pub free_slots: i32,
}

impl CapacityRecord {
    /// Capacity record of a freshly formatted image
    pub fn new() -> Self {
        CapacityRecord {
            total_blocks: TOTAL_BLOCKS as i32,
            block_size: BLOCK_SIZE as i32,
            free_blocks: DATA_BLOCKS as i32,
            total_slots: MAX_FILES as i32,
            free_slots: MAX_FILES as i32,
        }
    }

    /// Check the fixed geometry fields
    ///
    /// The free counters are not checked here: they are caches and drift is
    /// repaired by reconciliation rather than rejected.
    pub fn validate(&self) -> Result<()> {
        if self.total_blocks != TOTAL_BLOCKS as i32 {
            return Err(FsError::InvalidImage(format!(
                "total blocks is {}, expected {}",
                self.total_blocks, TOTAL_BLOCKS
            )));
        }

        if self.block_size != BLOCK_SIZE as i32 {
            return Err(FsError::InvalidImage(format!(
                "block size is {}, expected {}",
                self.block_size, BLOCK_SIZE
            )));
        }

        if self.total_slots != MAX_FILES as i32 {
            return Err(FsError::InvalidImage(format!(
                "total slots is {}, expected {}",
                self.total_slots, MAX_FILES
            )));
        }

        Ok(())
    }

    /// Serialize to a full block (zero padded)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BLOCK_SIZE);

        bytes.extend_from_slice(&self.total_blocks.to_le_bytes());
        bytes.extend_from_slice(&self.block_size.to_le_bytes());
        bytes.extend_from_slice(&self.free_blocks.to_le_bytes());
        bytes.extend_from_slice(&self.total_slots.to_le_bytes());
        bytes.extend_from_slice(&self.free_slots.to_le_bytes());

        bytes.resize(BLOCK_SIZE, 0);
        bytes
    }

    /// Deserialize without validating
    ///
    /// Validation is left to the caller so that attach can report geometry
    /// mismatches as `InvalidImage` rather than a decode failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CAPACITY_RECORD_LEN {
            return Err(FsError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for capacity record",
            )));
        }

        Ok(CapacityRecord {
            total_blocks: read_i32(bytes, 0),
            block_size: read_i32(bytes, 4),
            free_blocks: read_i32(bytes, 8),
            total_slots: read_i32(bytes, 12),
            free_slots: read_i32(bytes, 16),
        })
    }
}

impl Default for CapacityRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte offset of a block within the image
pub fn block_offset(block: usize) -> u64 {
    (block * BLOCK_SIZE) as u64
}

/// Whether `block` lies in the data region
pub fn is_data_block(block: usize) -> bool {
    (DATA_START..TOTAL_BLOCKS).contains(&block)
}

/// Number of blocks needed to hold `size` bytes
pub fn blocks_for(size: usize) -> usize {
    size.div_ceil(BLOCK_SIZE)
}

/// Little-endian i32 at `offset`; caller guarantees bounds
pub(crate) fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_le_bytes(buf)
}
