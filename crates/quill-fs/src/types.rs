//! Request, result, and introspection types
//!
//! A [`WriteRequest`] is immutable and single-use; a [`WriteResult`] is
//! owned by the caller after return with no further lifecycle.

use std::path::PathBuf;

use serde::Serialize;

/// Input to a single atomic write.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// Destination path (relative paths resolve against the current
    /// directory).
    pub path: PathBuf,
    /// Full content to materialize at the destination.
    pub content: String,
    /// Allow replacing an existing file. Off by default.
    pub overwrite: bool,
    /// Snapshot an existing file before replacing it. Off by default.
    pub backup: bool,
}

impl WriteRequest {
    /// New request with overwrite and backup disabled.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            overwrite: false,
            backup: false,
        }
    }

    /// Set the overwrite flag.
    #[inline]
    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Set the backup flag.
    #[inline]
    #[must_use]
    pub fn backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }
}

/// Outcome of a completed write, chunked or not.
#[derive(Debug, Clone, Serialize)]
pub struct WriteResult {
    /// Resolved absolute destination path.
    pub path: PathBuf,
    /// Exact byte length now durably present at `path`.
    pub bytes_written: u64,
    /// True if the destination did not exist before the call.
    pub created: bool,
    /// Path of the pre-write snapshot, when one was taken.
    pub backup_path: Option<PathBuf>,
}

/// One ordered chunk of a streamed write session.
#[derive(Debug, Clone)]
pub struct ChunkWriteRequest {
    /// Caller-supplied session identifier.
    pub session_id: String,
    /// Zero-based index; must exactly equal the count already received.
    pub chunk_index: u64,
    /// Raw chunk bytes appended to the session spool.
    pub data: Vec<u8>,
    /// Marks this chunk as the final one, fixing the expected total.
    pub is_last: bool,
}

impl ChunkWriteRequest {
    /// New non-final chunk.
    #[inline]
    #[must_use]
    pub fn new(session_id: impl Into<String>, chunk_index: u64, data: impl Into<Vec<u8>>) -> Self {
        Self {
            session_id: session_id.into(),
            chunk_index,
            data: data.into(),
            is_last: false,
        }
    }

    /// Mark this chunk as the last of its session.
    #[inline]
    #[must_use]
    pub fn last(mut self) -> Self {
        self.is_last = true;
        self
    }
}

/// Snapshot of an active chunk session's progress.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkSessionInfo {
    /// Session identifier.
    pub session_id: String,
    /// Declared total chunk count, once a chunk was marked last.
    pub total_chunks: Option<u64>,
    /// Chunks accepted so far.
    pub received_chunks: u64,
    /// Filesystem path of the session's spool file.
    pub temp_path: PathBuf,
    /// True for any session present in the registry.
    pub created: bool,
}
