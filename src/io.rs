//! Positioned I/O against the backing image

use crate::allocator::bitmap::FreeBitmap;
use crate::catalog::RecordTable;
use crate::error::{FsError, Result};
use crate::layout::{
    block_offset, is_data_block, CapacityRecord, BITMAP_BLOCK, BLOCK_SIZE, CAPACITY_BLOCK,
    IMAGE_SIZE, RECORD_TABLE_BLOCKS, RECORD_TABLE_START,
};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Disk-backed image storage
pub struct ImageFile {
    file: File,
    path: PathBuf,
}

impl ImageFile {
    /// Create (or truncate) an image file of exactly `IMAGE_SIZE` zero bytes
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        file.set_len(IMAGE_SIZE)?;

        Ok(ImageFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Open an existing image file
    ///
    /// A missing file is reported as `NotFound`, a short one as `InvalidImage`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FsError::NotFound(path.as_ref().display().to_string()));
            }
            Err(e) => return Err(FsError::Io(e)),
        };

        let len = file.metadata()?.len();
        if len < IMAGE_SIZE {
            return Err(FsError::InvalidImage(format!(
                "image is {} bytes, expected {}",
                len, IMAGE_SIZE
            )));
        }

        Ok(ImageFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.flush()?;
        Ok(())
    }

    /// Read the capacity record (block 0)
    pub fn read_capacity(&mut self) -> Result<CapacityRecord> {
        let bytes = self.read_at(block_offset(CAPACITY_BLOCK), BLOCK_SIZE)?;
        CapacityRecord::from_bytes(&bytes)
    }

    /// Write the capacity record (block 0)
    pub fn write_capacity(&mut self, capacity: &CapacityRecord) -> Result<()> {
        self.write_at(block_offset(CAPACITY_BLOCK), &capacity.to_bytes())
    }

    /// Read the free-space bitmap (block 1)
    pub fn read_bitmap(&mut self) -> Result<FreeBitmap> {
        let bytes = self.read_at(block_offset(BITMAP_BLOCK), BLOCK_SIZE)?;
        FreeBitmap::from_bytes(&bytes)
    }

    /// Write the free-space bitmap (block 1)
    pub fn write_bitmap(&mut self, bitmap: &FreeBitmap) -> Result<()> {
        self.write_at(block_offset(BITMAP_BLOCK), &bitmap.to_bytes())
    }

    /// Read the whole record table (blocks 2-9)
    pub fn read_table(&mut self) -> Result<RecordTable> {
        let bytes = self.read_at(
            block_offset(RECORD_TABLE_START),
            RECORD_TABLE_BLOCKS * BLOCK_SIZE,
        )?;
        RecordTable::from_bytes(&bytes)
    }

    /// Write the whole record table (blocks 2-9)
    pub fn write_table(&mut self, table: &RecordTable) -> Result<()> {
        self.write_at(block_offset(RECORD_TABLE_START), &table.to_bytes())
    }

    /// Read a data block
    pub fn read_block(&mut self, block: u32) -> Result<Vec<u8>> {
        if !is_data_block(block as usize) {
            return Err(FsError::InvalidBlock(block));
        }
        self.read_at(block_offset(block as usize), BLOCK_SIZE)
    }

    /// Write up to one block of data, zero filling the rest of the block
    pub fn write_block(&mut self, block: u32, data: &[u8]) -> Result<()> {
        if !is_data_block(block as usize) {
            return Err(FsError::InvalidBlock(block));
        }

        if data.len() > BLOCK_SIZE {
            return Err(FsError::InvalidArgument(format!(
                "block data must be at most {} bytes, got {}",
                BLOCK_SIZE,
                data.len()
            )));
        }

        let mut buffer = vec![0u8; BLOCK_SIZE];
        buffer[..data.len()].copy_from_slice(data);
        self.write_at(block_offset(block as usize), &buffer)
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync all writes to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DATA_START;
    use tempfile::NamedTempFile;

    #[test]
    fn test_create_sets_image_size() {
        let temp = NamedTempFile::new().unwrap();
        ImageFile::create(temp.path()).unwrap();

        let len = std::fs::metadata(temp.path()).unwrap().len();
        assert_eq!(len, IMAGE_SIZE);
    }

    #[test]
    fn test_create_and_read_capacity() {
        let temp = NamedTempFile::new().unwrap();
        let mut image = ImageFile::create(temp.path()).unwrap();

        let mut capacity = CapacityRecord::new();
        capacity.free_blocks = 100;
        image.write_capacity(&capacity).unwrap();

        assert_eq!(image.read_capacity().unwrap(), capacity);
    }

    #[test]
    fn test_write_and_read_block() {
        let temp = NamedTempFile::new().unwrap();
        let mut image = ImageFile::create(temp.path()).unwrap();

        image.write_block(DATA_START as u32, b"Hello").unwrap();

        let data = image.read_block(DATA_START as u32).unwrap();
        assert_eq!(data.len(), BLOCK_SIZE);
        assert_eq!(&data[0..5], b"Hello");
        assert!(data[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_metadata_block_io_rejected() {
        let temp = NamedTempFile::new().unwrap();
        let mut image = ImageFile::create(temp.path()).unwrap();

        assert!(matches!(image.read_block(0), Err(FsError::InvalidBlock(0))));
        assert!(matches!(
            image.write_block(9, b"x"),
            Err(FsError::InvalidBlock(9))
        ));
    }

    #[test]
    fn test_oversized_block_write_rejected() {
        let temp = NamedTempFile::new().unwrap();
        let mut image = ImageFile::create(temp.path()).unwrap();

        let data = vec![1u8; BLOCK_SIZE + 1];
        assert!(matches!(
            image.write_block(DATA_START as u32, &data),
            Err(FsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_open_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = ImageFile::open(dir.path().join("missing.img"));
        assert!(matches!(result, Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_open_short_file() {
        let temp = NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), vec![0u8; BLOCK_SIZE]).unwrap();

        let result = ImageFile::open(temp.path());
        assert!(matches!(result, Err(FsError::InvalidImage(_))));
    }

    #[test]
    fn test_open_existing() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_path_buf();

        {
            let mut image = ImageFile::create(&path).unwrap();
            image.write_bitmap(&FreeBitmap::new()).unwrap();
            image.write_table(&RecordTable::new()).unwrap();
        }

        let mut image = ImageFile::open(&path).unwrap();
        assert_eq!(image.path(), path.as_path());
        assert!(image.read_bitmap().unwrap().metadata_reserved());
        assert_eq!(image.read_table().unwrap().used_count(), 0);
    }
}
