//! Record table entries
//!
//! Each record occupies 128 bytes on disk:
//!
//! ```text
//! offset  size  field
//!      0     4  used flag (i32)
//!      4    28  name, NUL padded
//!     32     4  size in bytes (i32)
//!     36    48  12 direct block indices (i32, -1 = unused)
//!     84    44  padding
//! ```

use crate::error::{FsError, Result};
use crate::layout::{
    blocks_for, is_data_block, read_i32, BLOCK_SIZE, MAX_DIRECT_BLOCKS, MAX_FILE_SIZE,
    MAX_NAME_LEN, RECORD_SIZE,
};
use serde::{Deserialize, Serialize};

/// On-disk value of an unused block slot
pub const SENTINEL: i32 = -1;

const NAME_OFFSET: usize = 4;
const SIZE_OFFSET: usize = NAME_OFFSET + MAX_NAME_LEN;
const BLOCKS_OFFSET: usize = SIZE_OFFSET + 4;

/// One file's metadata: name, size and direct block list
///
/// Block slots are packed from the front in logical order; `None` is the
/// unused sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub used: bool,
    pub name: String,
    pub size: u32,
    pub blocks: [Option<u32>; MAX_DIRECT_BLOCKS],
}

impl Record {
    /// An unused record: no name, size 0, every slot sentinel
    pub fn empty() -> Self {
        Record {
            used: false,
            name: String::new(),
            size: 0,
            blocks: [None; MAX_DIRECT_BLOCKS],
        }
    }

    /// A freshly created file
    pub fn new_file(name: &str) -> Self {
        Record {
            used: true,
            name: name.to_string(),
            ..Self::empty()
        }
    }

    /// Block indices held by this record, in logical order
    pub fn allocated_blocks(&self) -> Vec<u32> {
        self.blocks.iter().flatten().copied().collect()
    }

    /// Number of non-sentinel block slots
    pub fn block_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }

    /// Whether size and block count agree
    pub fn is_consistent(&self) -> bool {
        self.size as usize <= MAX_FILE_SIZE && blocks_for(self.size as usize) == self.block_count()
    }

    /// Drop every block reference and the size, returning what was held
    pub fn clear_blocks(&mut self) -> Vec<u32> {
        let held = self.allocated_blocks();
        self.blocks = [None; MAX_DIRECT_BLOCKS];
        self.size = 0;
        held
    }

    /// Serialize to a 128-byte entry
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];

        bytes[0..4].copy_from_slice(&(self.used as i32).to_le_bytes());

        let name = self.name.as_bytes();
        let len = name.len().min(MAX_NAME_LEN);
        bytes[NAME_OFFSET..NAME_OFFSET + len].copy_from_slice(&name[..len]);

        bytes[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&(self.size as i32).to_le_bytes());

        for (i, slot) in self.blocks.iter().enumerate() {
            let value = slot.map(|b| b as i32).unwrap_or(SENTINEL);
            let offset = BLOCKS_OFFSET + i * 4;
            bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }

        bytes
    }

    /// Deserialize a 128-byte entry
    ///
    /// Unused entries decode as [`Record::empty`] whatever their remaining
    /// bytes hold. Used entries must have a non-negative size, a UTF-8 name,
    /// and block slots that are either the sentinel or a data-region index.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RECORD_SIZE {
            return Err(FsError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for record",
            )));
        }

        if read_i32(bytes, 0) == 0 {
            return Ok(Self::empty());
        }

        let raw_name = &bytes[NAME_OFFSET..NAME_OFFSET + MAX_NAME_LEN];
        let end = raw_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_LEN);
        let name = String::from_utf8(raw_name[..end].to_vec())
            .map_err(|_| FsError::InvalidImage("record name is not valid UTF-8".to_string()))?;

        let size = read_i32(bytes, SIZE_OFFSET);
        if size < 0 {
            return Err(FsError::InvalidImage(format!(
                "record '{}' has negative size {}",
                name, size
            )));
        }

        let mut blocks = [None; MAX_DIRECT_BLOCKS];
        for (i, slot) in blocks.iter_mut().enumerate() {
            let value = read_i32(bytes, BLOCKS_OFFSET + i * 4);
            if value == SENTINEL {
                continue;
            }
            if value < 0 || !is_data_block(value as usize) {
                return Err(FsError::InvalidImage(format!(
                    "record '{}' references block {} outside the data region",
                    name, value
                )));
            }
            *slot = Some(value as u32);
        }

        Ok(Record {
            used: true,
            name,
            size: size as u32,
            blocks,
        })
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::empty()
    }
}

/// Snapshot of a used record, as returned by `Session::stat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Record table slot holding the file
    pub slot: usize,

    /// File name
    pub name: String,

    /// File size in bytes
    pub size: u64,

    /// Data block indices in logical order
    pub blocks: Vec<u32>,
}

impl FileStat {
    pub(crate) fn from_record(slot: usize, record: &Record) -> Self {
        FileStat {
            slot,
            name: record.name.clone(),
            size: record.size as u64,
            blocks: record.allocated_blocks(),
        }
    }

    /// Bytes reserved on disk (whole blocks)
    pub fn allocated_bytes(&self) -> u64 {
        (self.blocks.len() * BLOCK_SIZE) as u64
    }
}
