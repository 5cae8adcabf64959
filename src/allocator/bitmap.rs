//! Free-space bitmap (block 1)
//!
//! One bit per block across the whole image, least significant bit first:
//! block `i` is bit `i % 8` of byte `i / 8`.
//! - 0 = free block
//! - 1 = allocated block
//!
//! Metadata-region bits are set at format time and never change. Only data
//! region bits are ever flipped or handed out.

use crate::allocator::BlockAllocator;
use crate::error::{FsError, Result};
use crate::layout::{is_data_block, BITMAP_BYTES, BLOCK_SIZE, DATA_START, TOTAL_BLOCKS};

/// Persisted free-space bitmap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeBitmap {
    bytes: Vec<u8>,
}

impl FreeBitmap {
    /// Bitmap of a freshly formatted image: metadata used, data free
    pub fn new() -> Self {
        let mut bitmap = FreeBitmap {
            bytes: vec![0u8; BITMAP_BYTES],
        };
        for block in 0..DATA_START {
            bitmap.set(block);
        }
        bitmap
    }

    /// Decode from the bitmap block (only the first 320 bytes are significant)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < BITMAP_BYTES {
            return Err(FsError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for bitmap",
            )));
        }

        Ok(FreeBitmap {
            bytes: bytes[..BITMAP_BYTES].to_vec(),
        })
    }

    /// Encode as a full block, zero padded
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.bytes.clone();
        bytes.resize(BLOCK_SIZE, 0);
        bytes
    }

    /// Raw bitmap bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Check if a block is marked allocated; out-of-range indices read as free
    pub fn is_allocated(&self, block: usize) -> bool {
        if block >= TOTAL_BLOCKS {
            return false;
        }
        (self.bytes[block / 8] & (1u8 << (block % 8))) != 0
    }

    /// Whether every metadata-region bit is set
    pub fn metadata_reserved(&self) -> bool {
        (0..DATA_START).all(|block| self.is_allocated(block))
    }

    /// First-fit search over the data region
    pub fn find_free_block(&self) -> Option<usize> {
        (DATA_START..TOTAL_BLOCKS).find(|&block| !self.is_allocated(block))
    }

    /// Exhaustive count of free data blocks
    pub fn count_free(&self) -> usize {
        (DATA_START..TOTAL_BLOCKS)
            .filter(|&block| !self.is_allocated(block))
            .count()
    }

    /// Mark a data block allocated
    pub fn mark_used(&mut self, block: usize) -> Result<()> {
        if !is_data_block(block) {
            return Err(FsError::InvalidBlock(block as u32));
        }
        self.set(block);
        Ok(())
    }

    /// Mark a data block free
    pub fn mark_free(&mut self, block: usize) -> Result<()> {
        if !is_data_block(block) {
            return Err(FsError::InvalidBlock(block as u32));
        }

        if !self.is_allocated(block) {
            tracing::warn!("Double-free detected for block {}", block);
            return Ok(());
        }

        self.bytes[block / 8] &= !(1u8 << (block % 8));
        Ok(())
    }

    fn set(&mut self, block: usize) {
        self.bytes[block / 8] |= 1u8 << (block % 8);
    }
}

impl Default for FreeBitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockAllocator for FreeBitmap {
    fn allocate(&mut self) -> Result<u32> {
        let block = self.find_free_block().ok_or(FsError::OutOfSpace)?;
        self.mark_used(block)?;
        Ok(block as u32)
    }

    fn free(&mut self, blocks: &[u32]) -> Result<usize> {
        let mut released = 0;
        for &block in blocks {
            let block = block as usize;
            if self.is_allocated(block) {
                released += 1;
            }
            self.mark_free(block)?;
        }
        Ok(released)
    }

    fn free_blocks(&self) -> usize {
        self.count_free()
    }
}
