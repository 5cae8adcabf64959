//! Record table (blocks 2-9)
//!
//! A fixed array of 256 records. Lookup is a linear scan; there is no index,
//! the table is small and re-read from the image on every operation.

pub mod record;

pub use record::{FileStat, Record, SENTINEL};

use crate::error::{FsError, Result};
use crate::layout::{MAX_FILES, RECORD_SIZE};

/// The full record table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTable {
    records: Vec<Record>,
}

impl RecordTable {
    /// Table of a freshly formatted image: every entry unused
    pub fn new() -> Self {
        RecordTable {
            records: vec![Record::empty(); MAX_FILES],
        }
    }

    /// Decode all 256 entries
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MAX_FILES * RECORD_SIZE {
            return Err(FsError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for record table",
            )));
        }

        let records = bytes
            .chunks_exact(RECORD_SIZE)
            .take(MAX_FILES)
            .map(Record::from_bytes)
            .collect::<Result<Vec<_>>>()?;

        Ok(RecordTable { records })
    }

    /// Encode all 256 entries (exactly 8 blocks)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MAX_FILES * RECORD_SIZE);
        for record in &self.records {
            bytes.extend_from_slice(&record.to_bytes());
        }
        bytes
    }

    /// Slot of the used record named exactly `name`
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record.used && record.name == name)
    }

    pub fn get(&self, slot: usize) -> Option<&Record> {
        self.records.get(slot)
    }

    /// Replace the record at `slot`
    pub fn set(&mut self, slot: usize, record: Record) {
        if let Some(entry) = self.records.get_mut(slot) {
            *entry = record;
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Used records with their slot index, in table order
    pub fn iter_used(&self) -> impl Iterator<Item = (usize, &Record)> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.used)
    }

    pub fn used_count(&self) -> usize {
        self.records.iter().filter(|record| record.used).count()
    }

    pub fn free_count(&self) -> usize {
        MAX_FILES - self.used_count()
    }
}

impl Default for RecordTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table() {
        let table = RecordTable::new();
        assert_eq!(table.records().len(), MAX_FILES);
        assert_eq!(table.used_count(), 0);
        assert_eq!(table.free_count(), MAX_FILES);
        assert_eq!(table.to_bytes().len(), MAX_FILES * RECORD_SIZE);
    }

    #[test]
    fn test_find_by_name() {
        let mut table = RecordTable::new();
        table.set(4, Record::new_file("four"));
        table.set(7, Record::new_file("seven"));

        assert_eq!(table.find_by_name("four"), Some(4));
        assert_eq!(table.find_by_name("seven"), Some(7));
        assert_eq!(table.find_by_name("Four"), None);
        assert_eq!(table.find_by_name("fou"), None);
        assert_eq!(table.find_by_name("fourr"), None);
    }

    #[test]
    fn test_unused_records_never_match() {
        let mut table = RecordTable::new();
        let mut stale = Record::new_file("ghost");
        stale.used = false;
        table.set(0, stale);

        assert_eq!(table.find_by_name("ghost"), None);
    }

    #[test]
    fn test_round_trip_through_bytes() {
        let mut table = RecordTable::new();
        let mut record = Record::new_file("blocks");
        record.size = 4096 * 2;
        record.blocks[0] = Some(10);
        record.blocks[1] = Some(11);
        table.set(255, record);

        let decoded = RecordTable::from_bytes(&table.to_bytes()).unwrap();
        assert_eq!(decoded, table);
        assert_eq!(decoded.iter_used().map(|(slot, _)| slot).collect::<Vec<_>>(), vec![255]);
    }

    #[test]
    fn test_short_buffer() {
        let result = RecordTable::from_bytes(&[0u8; RECORD_SIZE]);
        assert!(matches!(result, Err(FsError::Io(_))));
    }
}
