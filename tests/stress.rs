//! Randomized operation stress test
//!
//! Drives a long random sequence of create/write/delete calls and compares
//! every file against an in-memory model, then re-attaches and compares again.

use flatfs::{FsError, Session, DATA_BLOCKS, MAX_FILES, MAX_FILE_SIZE};
use std::collections::HashMap;

const NAMES: usize = 40;
const OPERATIONS: usize = 2_000;

fn verify(fs: &mut Session, model: &HashMap<String, Vec<u8>>) {
    let mut listed = fs.list(MAX_FILES).unwrap();
    listed.sort();
    let mut expected: Vec<String> = model.keys().cloned().collect();
    expected.sort();
    assert_eq!(listed, expected);

    for (name, data) in model {
        assert_eq!(&fs.read_to_vec(name).unwrap(), data, "content of {}", name);
    }

    let report = fs.check().unwrap();
    assert!(report.is_clean(), "inconsistent image: {:?}", report);
}

#[test]
fn test_random_operations_match_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stress.img");

    let mut fs = Session::new();
    fs.format(&path).unwrap();
    fs.attach(&path).unwrap();

    let mut model: HashMap<String, Vec<u8>> = HashMap::new();

    for op in 0..OPERATIONS {
        let idx = rand::random::<usize>() % NAMES;
        let name = format!("stress_{}", idx);

        match rand::random::<u8>() % 4 {
            0 => match fs.create(&name) {
                Ok(()) => {
                    model.insert(name, Vec::new());
                }
                Err(FsError::AlreadyExists(_)) => assert!(model.contains_key(&name)),
                Err(e) => panic!("create {} failed: {}", name, e),
            },
            1 => match fs.delete(&name) {
                Ok(()) => {
                    assert!(model.remove(&name).is_some());
                }
                Err(FsError::NotFound(_)) => assert!(!model.contains_key(&name)),
                Err(e) => panic!("delete {} failed: {}", name, e),
            },
            _ => {
                let size = rand::random::<usize>() % (MAX_FILE_SIZE + 1);
                let data = vec![(op % 251) as u8; size];
                match fs.write(&name, &data) {
                    Ok(()) => {
                        model.insert(name, data);
                    }
                    Err(FsError::NotFound(_)) => assert!(!model.contains_key(&name)),
                    Err(e) => panic!("write {} failed: {}", name, e),
                }
            }
        }
    }

    verify(&mut fs, &model);

    let used: usize = model.values().map(|data| data.len().div_ceil(4096)).sum();
    assert_eq!(fs.free_blocks().unwrap() as usize, DATA_BLOCKS - used);

    fs.detach();
    fs.attach(&path).unwrap();
    verify(&mut fs, &model);
}
