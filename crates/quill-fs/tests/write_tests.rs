use std::fs;
use std::sync::Arc;
use std::thread;

use quill_fs::{
    BackupManager, SafeFileWriter, WriteError, WriteRequest, WriterConfig,
};
use tempfile::TempDir;

fn writer_in(dir: &TempDir) -> SafeFileWriter {
    SafeFileWriter::from_config(&WriterConfig::rooted(dir.path())).unwrap()
}

#[test]
fn hello_scenario() {
    let dir = TempDir::new().unwrap();
    let writer = writer_in(&dir);
    let target = dir.path().join("hello.txt");

    let result = writer.write(WriteRequest::new(&target, "hello")).unwrap();

    assert!(result.created);
    assert_eq!(result.bytes_written, 5);
    assert_eq!(result.backup_path, None);
    assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
}

#[test]
fn existing_file_requires_overwrite() {
    let dir = TempDir::new().unwrap();
    let writer = writer_in(&dir);
    let target = dir.path().join("guarded.txt");
    fs::write(&target, "keep me").unwrap();

    let err = writer.write(WriteRequest::new(&target, "gone")).unwrap_err();
    assert!(matches!(err, WriteError::AlreadyExists { .. }));
    assert_eq!(fs::read_to_string(&target).unwrap(), "keep me");
}

#[test]
fn backup_round_trip_with_cleanup() {
    let dir = TempDir::new().unwrap();
    let config = WriterConfig::rooted(dir.path());
    let writer = SafeFileWriter::from_config(&config).unwrap();
    let backups = BackupManager::new(config.backup_root.clone());
    let target = dir.path().join("tracked.txt");
    fs::write(&target, "version one").unwrap();

    let result = writer
        .write(
            WriteRequest::new(&target, "version two")
                .overwrite(true)
                .backup(true),
        )
        .unwrap();

    let backup_path = result.backup_path.expect("backup expected");
    assert_eq!(fs::read_to_string(&backup_path).unwrap(), "version one");

    backups.restore_backup(&backup_path, &target).unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "version one");

    backups.cleanup_backup(&backup_path).unwrap();
    assert!(!backup_path.exists());
}

#[test]
fn backup_cleanup_never_reaches_outside_its_root() {
    let dir = TempDir::new().unwrap();
    let config = WriterConfig::rooted(dir.path());
    let backups = BackupManager::new(config.backup_root);
    let victim = dir.path().join("victim.txt");
    fs::write(&victim, "still here").unwrap();

    let err = backups.cleanup_backup(&victim).unwrap_err();
    assert!(matches!(err, WriteError::OutsideBackupRoot { .. }));
    assert_eq!(fs::read_to_string(&victim).unwrap(), "still here");
}

#[test]
fn traversal_is_rejected_whether_or_not_target_exists() {
    let dir = TempDir::new().unwrap();
    let writer = writer_in(&dir);

    let missing = dir.path().join("../missing.txt");
    assert!(matches!(
        writer.write(WriteRequest::new(&missing, "x")),
        Err(WriteError::PathTraversal { .. })
    ));

    let existing = dir.path().join("../present.txt");
    assert!(matches!(
        writer.validate_path(&existing),
        Err(WriteError::PathTraversal { .. })
    ));
}

#[test]
fn concurrent_writers_to_one_path_leave_a_complete_file() {
    let dir = TempDir::new().unwrap();
    let writer = Arc::new(writer_in(&dir));
    let target = dir.path().join("contended.txt");

    // Distinct content lengths so a torn write would be detectable.
    let contents: Vec<String> = (1..=8).map(|n| "x".repeat(n * 100)).collect();

    let handles: Vec<_> = contents
        .iter()
        .cloned()
        .map(|content| {
            let writer = Arc::clone(&writer);
            let target = target.clone();
            thread::spawn(move || {
                writer
                    .write(WriteRequest::new(&target, content).overwrite(true))
                    .unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let final_len = fs::read_to_string(&target).unwrap().len();
    assert!(
        contents.iter().any(|c| c.len() == final_len),
        "file length {final_len} matches none of the written contents"
    );
}

#[test]
fn readers_never_observe_a_partial_file() {
    let dir = TempDir::new().unwrap();
    let writer = Arc::new(writer_in(&dir));
    let target = dir.path().join("observed.txt");

    let short = "a".repeat(64);
    let long = "b".repeat(64 * 1024);
    let valid_lens = [0, short.len(), long.len()];

    writer
        .write(WriteRequest::new(&target, short.clone()))
        .unwrap();

    let reader_target = target.clone();
    let reader = thread::spawn(move || {
        for _ in 0..200 {
            if let Ok(bytes) = fs::read(&reader_target) {
                assert!(
                    valid_lens.contains(&bytes.len()),
                    "observed partial file of {} bytes",
                    bytes.len()
                );
            }
        }
    });

    for _ in 0..50 {
        writer
            .write(WriteRequest::new(&target, long.clone()).overwrite(true))
            .unwrap();
        writer
            .write(WriteRequest::new(&target, short.clone()).overwrite(true))
            .unwrap();
    }

    reader.join().unwrap();
}
