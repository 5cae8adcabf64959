//! # flatfs - Flat Block File Store
//!
//! A minimal file store contained entirely inside one fixed-size image file.
//! Files live in a single flat namespace and are created, listed, read,
//! overwritten and deleted through a [`Session`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flatfs::{Result, Session};
//!
//! # fn main() -> Result<()> {
//! let mut fs = Session::new();
//! fs.format("disk.img")?;
//! fs.attach("disk.img")?;
//!
//! fs.create("a.txt")?;
//! fs.write("a.txt", &[7u8; 10_000])?;
//!
//! let content = fs.read_to_vec("a.txt")?;
//! assert_eq!(content.len(), 10_000);
//!
//! let names = fs.list(16)?;
//! assert_eq!(names, vec!["a.txt"]);
//!
//! fs.detach();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            Image File (10 MiB)              │
//! ├─────────────────────────────────────────────┤
//! │ Block 0: Capacity Record                    │
//! │  - total/free blocks, total/free slots      │
//! ├─────────────────────────────────────────────┤
//! │ Block 1: Free-Space Bitmap                  │
//! │  - one bit per block, metadata always set   │
//! ├─────────────────────────────────────────────┤
//! │ Blocks 2-9: Record Table                    │
//! │  - 256 x (used, name, size, 12 block ids)   │
//! ├─────────────────────────────────────────────┤
//! │ Blocks 10-2559: Data                        │
//! │  - file content, 4KB per block              │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Files are addressed through at most 12 direct blocks, so the largest file
//! is 48KB. Every write replaces the whole file.
//!
//! - [`layout`] - geometry constants and the capacity record
//! - [`allocator`] - first-fit bitmap allocation and counter reconciliation
//! - [`catalog`] - the record table and its entries
//! - [`io`] - positioned reads and writes against the image
//! - [`session`] - format/attach/detach and the file operations
//! - [`check`] - read-only consistency scan

pub mod allocator;
pub mod catalog;
pub mod check;
pub mod config;
pub mod error;
pub mod io;
pub mod layout;
pub mod session;
pub mod validation;

// Re-export commonly used types
pub use allocator::{bitmap::FreeBitmap, BlockAllocator};
pub use catalog::{FileStat, Record, RecordTable};
pub use check::{CheckReport, CounterDrift};
pub use config::Config;
pub use error::{FsError, Result};
pub use io::ImageFile;
pub use layout::{
    CapacityRecord, BLOCK_SIZE, DATA_BLOCKS, IMAGE_SIZE, MAX_DIRECT_BLOCKS, MAX_FILES,
    MAX_FILE_SIZE, MAX_NAME_LEN, TOTAL_BLOCKS,
};
pub use session::{Session, SessionStats};
pub use validation::FileName;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
