use std::fs;

use quill_fs::{
    ChunkWriteRequest, SafeFileWriter, StreamingChunkManager, WriteError, WriterConfig,
};
use tempfile::TempDir;

fn manager_in(dir: &TempDir) -> StreamingChunkManager<SafeFileWriter> {
    let config = WriterConfig::rooted(dir.path());
    let writer = SafeFileWriter::from_config(&config).unwrap();
    StreamingChunkManager::new(config.spool_dir, writer)
}

#[test]
fn foobar_scenario() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);
    let target = dir.path().join("out.txt");

    manager
        .write_chunk(ChunkWriteRequest::new("s1", 0, b"foo".to_vec()))
        .unwrap();
    manager
        .write_chunk(ChunkWriteRequest::new("s1", 1, b"bar".to_vec()).last())
        .unwrap();

    let result = manager.finalize_chunks("s1", &target).unwrap();
    assert_eq!(result.bytes_written, 6);
    assert_eq!(fs::read_to_string(&target).unwrap(), "foobar");
    assert!(matches!(
        manager.session_info("s1"),
        Err(WriteError::SessionNotFound(_))
    ));
}

#[test]
fn chunked_write_replaces_existing_file() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);
    let target = dir.path().join("existing.txt");
    fs::write(&target, "old content that is longer").unwrap();

    manager
        .write_chunk(ChunkWriteRequest::new("s1", 0, b"new".to_vec()).last())
        .unwrap();

    // Finalize always overwrites; no explicit flag needed from the caller.
    let result = manager.finalize_chunks("s1", &target).unwrap();
    assert!(!result.created);
    assert_eq!(result.bytes_written, 3);
    assert_eq!(fs::read_to_string(&target).unwrap(), "new");
}

#[test]
fn gapped_chunk_sequence_fails_and_preserves_progress() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);

    manager
        .write_chunk(ChunkWriteRequest::new("s1", 0, b"0".to_vec()))
        .unwrap();
    manager
        .write_chunk(ChunkWriteRequest::new("s1", 1, b"1".to_vec()))
        .unwrap();
    assert!(matches!(
        manager.write_chunk(ChunkWriteRequest::new("s1", 3, b"3".to_vec())),
        Err(WriteError::ChunkIndexMismatch { expected: 2, got: 3 })
    ));

    let info = manager.session_info("s1").unwrap();
    assert_eq!(info.received_chunks, 2);

    // The session is still usable with the correct next index.
    manager
        .write_chunk(ChunkWriteRequest::new("s1", 2, b"2".to_vec()).last())
        .unwrap();
    let target = dir.path().join("recovered.txt");
    manager.finalize_chunks("s1", &target).unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "012");
}

#[test]
fn finalize_to_unauthorized_target_consumes_the_session() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);

    manager
        .write_chunk(ChunkWriteRequest::new("s1", 0, b"data".to_vec()).last())
        .unwrap();
    let spool_path = manager.session_info("s1").unwrap().temp_path;

    let err = manager
        .finalize_chunks("s1", std::path::Path::new("/etc/forbidden.txt"))
        .unwrap_err();
    assert!(matches!(err, WriteError::OutsideSandbox { .. }));

    // Finalize removes the session up front; the spool is gone either way.
    assert!(matches!(
        manager.session_info("s1"),
        Err(WriteError::SessionNotFound(_))
    ));
    assert!(!spool_path.exists());
}

#[test]
fn large_session_streams_through_the_spool() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);
    let target = dir.path().join("large.txt");

    let chunk = "0123456789".repeat(1000);
    let total_chunks = 20u64;
    for index in 0..total_chunks {
        let mut request = ChunkWriteRequest::new("big", index, chunk.as_bytes().to_vec());
        if index == total_chunks - 1 {
            request = request.last();
        }
        manager.write_chunk(request).unwrap();
    }

    let result = manager.finalize_chunks("big", &target).unwrap();
    assert_eq!(result.bytes_written, chunk.len() as u64 * total_chunks);
    let written = fs::read_to_string(&target).unwrap();
    assert_eq!(written.len(), chunk.len() * total_chunks as usize);
    assert!(written.starts_with("0123456789"));
    assert!(written.ends_with("0123456789"));
}

#[test]
fn independent_sessions_do_not_interfere() {
    let dir = TempDir::new().unwrap();
    let manager = manager_in(&dir);

    for id in ["alpha", "beta", "gamma"] {
        manager
            .write_chunk(ChunkWriteRequest::new(id, 0, id.as_bytes().to_vec()).last())
            .unwrap();
    }

    manager.cleanup_session("beta").unwrap();

    for id in ["alpha", "gamma"] {
        let target = dir.path().join(format!("{id}.txt"));
        manager.finalize_chunks(id, &target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), id);
    }
    assert!(matches!(
        manager.finalize_chunks("beta", &dir.path().join("beta.txt")),
        Err(WriteError::SessionNotFound(_))
    ));
}
