//! Property-based tests for allocator correctness
//!
//! Uses proptest to verify allocator invariants hold across many random scenarios

use flatfs::{FreeBitmap, BlockAllocator, Session, BLOCK_SIZE, DATA_BLOCKS, MAX_FILE_SIZE};
use proptest::prelude::*;
use std::collections::HashSet;

fn attached() -> (tempfile::TempDir, Session) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prop.img");
    let mut fs = Session::new();
    fs.format(&path).unwrap();
    fs.attach(&path).unwrap();
    (dir, fs)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_no_double_allocation(
        sizes in prop::collection::vec(0usize..=MAX_FILE_SIZE, 1..20)
    ) {
        let (_dir, mut fs) = attached();

        for (i, size) in sizes.iter().enumerate() {
            let name = format!("file{}", i);
            fs.create(&name).unwrap();
            fs.write(&name, &vec![i as u8; *size]).unwrap();
        }

        let mut all_blocks = HashSet::new();
        for i in 0..sizes.len() {
            let stat = fs.stat(&format!("file{}", i)).unwrap();
            for &block in &stat.blocks {
                prop_assert!(all_blocks.insert(block), "Block {} allocated twice!", block);
            }
        }

        prop_assert!(fs.check().unwrap().is_clean());
    }

    #[test]
    fn prop_data_integrity(
        files in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..3 * BLOCK_SIZE), 1..8)
    ) {
        let (_dir, mut fs) = attached();

        for (i, data) in files.iter().enumerate() {
            let name = format!("data{}", i);
            fs.create(&name).unwrap();
            fs.write(&name, data).unwrap();
        }

        for (i, data) in files.iter().enumerate() {
            let content = fs.read_to_vec(&format!("data{}", i)).unwrap();
            prop_assert_eq!(&content, data);
        }
    }

    #[test]
    fn prop_free_blocks_after_deletes(
        sizes in prop::collection::vec(1usize..=MAX_FILE_SIZE, 1..16),
        delete_mask in prop::collection::vec(any::<bool>(), 16)
    ) {
        let (_dir, mut fs) = attached();

        for (i, size) in sizes.iter().enumerate() {
            let name = format!("f{}", i);
            fs.create(&name).unwrap();
            fs.write(&name, &vec![0xAB; *size]).unwrap();
        }

        let mut expected_used = 0usize;
        for (i, size) in sizes.iter().enumerate() {
            let name = format!("f{}", i);
            if delete_mask[i] {
                fs.delete(&name).unwrap();
            } else {
                expected_used += size.div_ceil(BLOCK_SIZE);
            }
        }

        prop_assert_eq!(fs.free_blocks().unwrap() as usize, DATA_BLOCKS - expected_used);
        prop_assert!(fs.check().unwrap().is_clean());
    }

    #[test]
    fn prop_bitmap_first_fit(frees in prop::collection::vec(0usize..64, 1..32)) {
        let mut bitmap = FreeBitmap::new();
        let mut held = Vec::new();
        for _ in 0..64 {
            held.push(bitmap.allocate().unwrap());
        }

        let released: Vec<u32> = frees.iter().map(|&i| held[i]).collect();
        bitmap.free(&released).unwrap();

        // The lowest released block comes back first
        let lowest = released.iter().copied().min().unwrap();
        prop_assert_eq!(bitmap.allocate().unwrap(), lowest);

        let unique: HashSet<u32> = released.into_iter().collect();
        prop_assert_eq!(bitmap.free_blocks(), DATA_BLOCKS - 64 + unique.len() - 1);
    }
}
