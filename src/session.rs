//! Session lifecycle and file operations
//!
//! A [`Session`] is either detached or attached to exactly one image. Every
//! file operation re-reads the metadata it needs from the image, mutates it in
//! memory, and writes it back before returning; nothing about the record
//! table or bitmap is cached between calls.

use crate::allocator::bitmap::FreeBitmap;
use crate::allocator::{self, BlockAllocator};
use crate::catalog::{FileStat, Record, RecordTable};
use crate::check::{self, CheckReport};
use crate::config::Config;
use crate::error::{FsError, Result};
use crate::io::ImageFile;
use crate::layout::{
    blocks_for, CapacityRecord, BLOCK_SIZE, DATA_BLOCKS, MAX_DIRECT_BLOCKS, MAX_FILES,
    MAX_FILE_SIZE, TOTAL_BLOCKS,
};
use crate::validation::FileName;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Capacity summary of an attached image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_blocks: usize,
    pub data_blocks: usize,
    pub free_blocks: usize,
    pub total_slots: usize,
    pub free_slots: usize,
    pub used_slots: usize,
}

impl SessionStats {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// All on-disk metadata, loaded for the duration of one operation
struct Metadata {
    capacity: CapacityRecord,
    bitmap: FreeBitmap,
    table: RecordTable,
}

impl Metadata {
    fn load(image: &mut ImageFile) -> Result<Self> {
        Ok(Metadata {
            capacity: image.read_capacity()?,
            bitmap: image.read_bitmap()?,
            table: image.read_table()?,
        })
    }

    /// Resynchronise both cached counters before they are adjusted
    fn reconcile(&mut self) {
        allocator::reconcile(&mut self.capacity, &self.bitmap);
        allocator::reconcile_slots(&mut self.capacity, &self.table);
    }

    fn store(&self, image: &mut ImageFile, sync: bool) -> Result<()> {
        image.write_capacity(&self.capacity)?;
        image.write_bitmap(&self.bitmap)?;
        image.write_table(&self.table)?;
        if sync {
            image.sync()?;
        }
        Ok(())
    }
}

/// Handle to at most one attached image
///
/// # Examples
///
/// ```no_run
/// use flatfs::Session;
///
/// # fn main() -> flatfs::Result<()> {
/// let mut fs = Session::new();
/// fs.format("disk.img")?;
/// fs.attach("disk.img")?;
///
/// fs.create("hello.txt")?;
/// fs.write("hello.txt", b"Hello, World!")?;
///
/// let mut buf = [0u8; 64];
/// let n = fs.read("hello.txt", &mut buf)?;
/// assert_eq!(&buf[..n], b"Hello, World!");
///
/// fs.detach();
/// # Ok(())
/// # }
/// ```
pub struct Session {
    image: Option<ImageFile>,
    config: Config,
}

impl Session {
    /// A detached session with the default configuration
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Session {
            image: None,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_attached(&self) -> bool {
        self.image.is_some()
    }

    /// Path of the attached image
    pub fn path(&self) -> Option<&Path> {
        self.image.as_ref().map(|image| image.path())
    }

    fn image(&mut self) -> Result<&mut ImageFile> {
        self.image.as_mut().ok_or(FsError::NotMounted)
    }

    /// Create or truncate an image and lay down empty metadata
    ///
    /// The session stays detached; call [`Session::attach`] afterwards.
    pub fn format<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if self.is_attached() {
            return Err(FsError::AlreadyActive);
        }

        let mut image = ImageFile::create(&path)?;
        let metadata = Metadata {
            capacity: CapacityRecord::new(),
            bitmap: FreeBitmap::new(),
            table: RecordTable::new(),
        };
        metadata.store(&mut image, true)?;

        info!(path = %path.as_ref().display(), "Formatted image");
        Ok(())
    }

    /// Open and validate an image, then attach to it
    ///
    /// On any failure the session stays detached.
    pub fn attach<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if self.is_attached() {
            return Err(FsError::AlreadyActive);
        }

        let mut image = ImageFile::open(&path)?;

        let mut capacity = image.read_capacity()?;
        capacity.validate()?;

        let bitmap = image.read_bitmap()?;
        if !bitmap.metadata_reserved() {
            return Err(FsError::InvalidImage(
                "metadata blocks are not marked used in the bitmap".to_string(),
            ));
        }

        // Decoding rejects negative sizes and out-of-region block references
        let table = image.read_table()?;

        if self.config.reconcile_on_attach {
            let blocks_drifted = allocator::reconcile(&mut capacity, &bitmap);
            let slots_drifted = allocator::reconcile_slots(&mut capacity, &table);
            if blocks_drifted || slots_drifted {
                image.write_capacity(&capacity)?;
            }
        }

        info!(
            path = %path.as_ref().display(),
            free_blocks = capacity.free_blocks,
            free_slots = capacity.free_slots,
            "Attached image"
        );
        self.image = Some(image);
        Ok(())
    }

    /// Release the image; a no-op when already detached
    pub fn detach(&mut self) {
        match self.image.take() {
            Some(mut image) => {
                if let Err(e) = image.sync() {
                    warn!("Failed to sync image on detach: {}", e);
                }
                info!(path = %image.path().display(), "Detached image");
            }
            None => debug!("Detach called with no image attached"),
        }
    }

    /// Create an empty file in the first free slot
    pub fn create(&mut self, name: &str) -> Result<()> {
        let sync = self.config.sync_writes;
        let image = self.image()?;
        let name = FileName::new(name)?;
        debug!(name = %name, "create");

        let mut meta = Metadata::load(image)?;

        if meta.table.find_by_name(name.as_str()).is_some() {
            return Err(FsError::AlreadyExists(name.into_string()));
        }

        let slot = allocator::find_free_slot(&meta.table).ok_or(FsError::OutOfSlots)?;
        meta.reconcile();
        meta.table.set(slot, Record::new_file(name.as_str()));
        meta.capacity.free_slots -= 1;

        meta.store(image, sync)
    }

    /// Delete a file and release its blocks
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let sync = self.config.sync_writes;
        let image = self.image()?;
        let name = FileName::new(name)?;
        debug!(name = %name, "delete");

        let mut meta = Metadata::load(image)?;

        let slot = meta
            .table
            .find_by_name(name.as_str())
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;

        let held = meta
            .table
            .get(slot)
            .map(Record::allocated_blocks)
            .unwrap_or_default();

        meta.reconcile();
        let released = meta.bitmap.free(&held)?;

        meta.table.set(slot, Record::empty());
        meta.capacity.free_blocks += released as i32;
        meta.capacity.free_slots += 1;

        meta.store(image, sync)
    }

    /// Names of up to `capacity` files, in table order
    pub fn list(&mut self, capacity: usize) -> Result<Vec<String>> {
        let image = self.image()?;

        if capacity == 0 || capacity > MAX_FILES {
            return Err(FsError::InvalidArgument(format!(
                "list capacity must be in 1..={}, got {}",
                MAX_FILES, capacity
            )));
        }

        let table = image.read_table()?;
        let mut names: Vec<String> = Vec::new();

        for (slot, record) in table.iter_used() {
            if names.len() == capacity {
                break;
            }
            if names.contains(&record.name) {
                warn!(slot, name = %record.name, "Skipping duplicate name in record table");
                continue;
            }
            names.push(record.name.clone());
        }

        Ok(names)
    }

    /// Replace a file's entire content
    ///
    /// Not atomic: the old blocks are released before the new ones are
    /// allocated. If space runs out or a block write fails part way, the
    /// blocks written so far are kept, the size reflects them, and the error
    /// (`OutOfSpace` or `Io`) is returned after the metadata is persisted.
    pub fn write(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let sync = self.config.sync_writes;
        let image = self.image()?;
        let name = FileName::new(name)?;
        debug!(name = %name, size = data.len(), "write");

        let mut meta = Metadata::load(image)?;

        let slot = meta
            .table
            .find_by_name(name.as_str())
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;

        if blocks_for(data.len()) > MAX_DIRECT_BLOCKS {
            return Err(FsError::OutOfRange {
                requested: data.len(),
                max: MAX_FILE_SIZE,
            });
        }

        meta.reconcile();

        let mut record = meta.table.get(slot).cloned().unwrap_or_default();
        let held = record.clear_blocks();
        let released = meta.bitmap.free(&held)?;
        meta.capacity.free_blocks += released as i32;

        let outcome = place_blocks(&mut meta, &mut record, data, |block, chunk| {
            image.write_block(block, chunk)
        });
        if let Err(e) = &outcome {
            warn!(
                name = %name,
                written = record.size,
                requested = data.len(),
                "Write stopped early, keeping partial content: {}",
                e
            );
        }

        meta.table.set(slot, record);
        meta.store(image, sync)?;
        outcome
    }

    /// Read up to `buf.len()` bytes from the start of a file
    ///
    /// Returns the number of bytes copied: `min(buf.len(), file size)`.
    pub fn read(&mut self, name: &str, buf: &mut [u8]) -> Result<usize> {
        let image = self.image()?;
        let name = FileName::new(name)?;
        debug!(name = %name, size = buf.len(), "read");

        let table = image.read_table()?;
        let record = table
            .find_by_name(name.as_str())
            .and_then(|slot| table.get(slot))
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;

        let effective = buf.len().min(record.size as usize);
        let mut copied = 0;

        for &block in record.blocks.iter().flatten() {
            if copied >= effective {
                break;
            }
            let data = image.read_block(block)?;
            let n = (effective - copied).min(BLOCK_SIZE);
            buf[copied..copied + n].copy_from_slice(&data[..n]);
            copied += n;
        }

        Ok(copied)
    }

    /// Read a whole file
    pub fn read_to_vec(&mut self, name: &str) -> Result<Vec<u8>> {
        let stat = self.stat(name)?;
        // A corrupt size can exceed what the block list addresses
        let mut buf = vec![0u8; (stat.size as usize).min(MAX_FILE_SIZE)];
        let n = self.read(name, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Number of free data blocks, reconciled against the bitmap
    pub fn free_blocks(&mut self) -> Result<u32> {
        let sync = self.config.sync_writes;
        let image = self.image()?;

        let mut capacity = image.read_capacity()?;
        let bitmap = image.read_bitmap()?;

        if allocator::reconcile(&mut capacity, &bitmap) {
            image.write_capacity(&capacity)?;
            if sync {
                image.sync()?;
            }
        }

        Ok(capacity.free_blocks as u32)
    }

    /// Metadata of one file
    pub fn stat(&mut self, name: &str) -> Result<FileStat> {
        let image = self.image()?;
        let name = FileName::new(name)?;

        let table = image.read_table()?;
        table
            .find_by_name(name.as_str())
            .and_then(|slot| table.get(slot).map(|record| FileStat::from_record(slot, record)))
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }

    pub fn exists(&mut self, name: &str) -> Result<bool> {
        let image = self.image()?;
        let name = FileName::new(name)?;
        Ok(image.read_table()?.find_by_name(name.as_str()).is_some())
    }

    /// Capacity summary, using the cached counters as stored
    pub fn stats(&mut self) -> Result<SessionStats> {
        let image = self.image()?;
        let capacity = image.read_capacity()?;
        let table = image.read_table()?;

        Ok(SessionStats {
            total_blocks: TOTAL_BLOCKS,
            data_blocks: DATA_BLOCKS,
            free_blocks: capacity.free_blocks.max(0) as usize,
            total_slots: MAX_FILES,
            free_slots: capacity.free_slots.max(0) as usize,
            used_slots: table.used_count(),
        })
    }

    /// Cross-check bitmap, record table and counters without modifying anything
    pub fn check(&mut self) -> Result<CheckReport> {
        let image = self.image()?;
        let meta = Metadata::load(image)?;
        Ok(check::scan(&meta.capacity, &meta.bitmap, &meta.table))
    }
}

/// Place `data` into freshly allocated blocks, stopping at the first failure
///
/// Blocks placed before the failure stay referenced by `record` and counted
/// in its size. A block whose write failed goes back to the bitmap. Running
/// out of blocks ends with `OutOfSpace`.
fn place_blocks<F>(
    meta: &mut Metadata,
    record: &mut Record,
    data: &[u8],
    mut put: F,
) -> Result<()>
where
    F: FnMut(u32, &[u8]) -> Result<()>,
{
    for (i, chunk) in data.chunks(BLOCK_SIZE).enumerate() {
        let block = meta.bitmap.allocate()?;

        if let Err(e) = put(block, chunk) {
            meta.bitmap.free(&[block])?;
            return Err(e);
        }

        meta.capacity.free_blocks -= 1;
        record.blocks[i] = Some(block);
        record.size += chunk.len() as u32;
    }

    Ok(())
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
