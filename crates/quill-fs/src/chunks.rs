//! Streamed chunk sessions
//!
//! [`StreamingChunkManager`] accumulates a sequence of partial writes into
//! a per-session spool file, then delegates the final, complete write to a
//! [`FileWriter`]. Chunks must arrive strictly in order with no gaps; the
//! session disappears from the registry on successful finalize or explicit
//! cleanup.
//!
//! The registry is a plain field of the manager — one manager instance owns
//! one session map, and nothing here is process-global.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tempfile::NamedTempFile;

use crate::error::{Result, WriteError};
use crate::types::{ChunkSessionInfo, ChunkWriteRequest, WriteRequest, WriteResult};
use crate::writer::FileWriter;

/// Mutable state of one chunk session, behind the session lock.
#[derive(Debug)]
struct SessionState {
    /// Buffered spool; taken at finalize, dropped (and deleted) on cleanup.
    spool: Option<BufWriter<NamedTempFile>>,
    spool_path: PathBuf,
    /// Unknown until a chunk is marked last.
    expected_chunks: Option<u64>,
    /// Monotonic, gapless: incremented by exactly 1 per accepted chunk.
    received_chunks: u64,
    last_activity: Instant,
}

/// An active chunked writing session, exclusively owned by its manager.
#[derive(Debug)]
struct ChunkSession {
    state: Mutex<SessionState>,
}

/// Accumulates ordered chunks per session and finalizes through a
/// [`FileWriter`].
#[derive(Debug)]
pub struct StreamingChunkManager<W: FileWriter> {
    sessions: RwLock<HashMap<String, Arc<ChunkSession>>>,
    spool_dir: PathBuf,
    writer: W,
}

impl<W: FileWriter> StreamingChunkManager<W> {
    /// Manager spooling sessions under `spool_dir` and finalizing through
    /// `writer`.
    #[must_use]
    pub fn new(spool_dir: impl Into<PathBuf>, writer: W) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            spool_dir: spool_dir.into(),
            writer,
        }
    }

    /// Append one chunk to its session, creating the session on first use.
    ///
    /// # Errors
    /// [`WriteError::ChunkIndexMismatch`] unless the chunk's index exactly
    /// equals the number already received; I/O errors from the spool.
    pub fn write_chunk(&self, request: ChunkWriteRequest) -> Result<()> {
        let session = self.session_or_create(&request.session_id)?;
        let mut state = session.state.lock();

        if request.chunk_index != state.received_chunks {
            return Err(WriteError::ChunkIndexMismatch {
                expected: state.received_chunks,
                got: request.chunk_index,
            });
        }

        let spool_path = state.spool_path.clone();
        let spool = state
            .spool
            .as_mut()
            .ok_or_else(|| WriteError::SessionNotFound(request.session_id.clone()))?;

        spool
            .write_all(&request.data)
            .map_err(|source| WriteError::io("write chunk data to", &spool_path, source))?;
        spool
            .flush()
            .map_err(|source| WriteError::io("flush chunk data to", &spool_path, source))?;

        state.received_chunks += 1;
        if request.is_last {
            state.expected_chunks = Some(request.chunk_index + 1);
        }
        state.last_activity = Instant::now();

        Ok(())
    }

    /// Complete a session: verify chunk count, durably sync the spool, and
    /// issue exactly one write of the accumulated content to `target_path`.
    ///
    /// The session is removed from the registry before any I/O, so a
    /// concurrent finalize of the same session fails with
    /// [`WriteError::SessionNotFound`] rather than double-writing.
    ///
    /// # Errors
    /// [`WriteError::IncompleteSession`] when a last chunk was declared but
    /// the counts disagree (checked before the underlying writer runs);
    /// [`WriteError::NonUtf8Content`] for a non-UTF-8 spool; plus anything
    /// the underlying writer returns.
    pub fn finalize_chunks(&self, session_id: &str, target_path: &Path) -> Result<WriteResult> {
        let session = self
            .sessions
            .write()
            .remove(session_id)
            .ok_or_else(|| WriteError::SessionNotFound(session_id.to_string()))?;

        let mut state = session.state.lock();

        if let Some(expected) = state.expected_chunks {
            if state.received_chunks != expected {
                return Err(WriteError::IncompleteSession {
                    expected,
                    received: state.received_chunks,
                });
            }
        }

        let spool_path = state.spool_path.clone();
        let buffered = state
            .spool
            .take()
            .ok_or_else(|| WriteError::SessionNotFound(session_id.to_string()))?;

        // into_inner flushes the remaining buffer.
        let spool = buffered
            .into_inner()
            .map_err(|error| WriteError::io("flush spool file", &spool_path, error.into_error()))?;
        spool
            .as_file()
            .sync_all()
            .map_err(|source| WriteError::io("sync spool file", &spool_path, source))?;

        let bytes = fs::read(spool.path())
            .map_err(|source| WriteError::io("read spool file", &spool_path, source))?;
        let total_bytes = bytes.len() as u64;
        drop(spool);

        let content = String::from_utf8(bytes).map_err(|_| WriteError::NonUtf8Content {
            path: spool_path.clone(),
        })?;

        let mut result = self
            .writer
            .write(WriteRequest::new(target_path, content).overwrite(true))?;
        result.bytes_written = total_bytes;

        tracing::debug!(
            session = session_id,
            path = %result.path.display(),
            bytes = total_bytes,
            "chunk session finalized"
        );

        Ok(result)
    }

    /// Remove and discard a session regardless of progress, deleting its
    /// spool file. Unknown sessions are a no-op success.
    ///
    /// # Errors
    /// Currently infallible; the signature matches the finalize/cleanup
    /// contract.
    pub fn cleanup_session(&self, session_id: &str) -> Result<()> {
        let Some(session) = self.sessions.write().remove(session_id) else {
            return Ok(());
        };

        let mut state = session.state.lock();
        // Dropping the spool deletes the temp file.
        drop(state.spool.take());
        tracing::debug!(session = session_id, "chunk session discarded");

        Ok(())
    }

    /// Snapshot an active session's progress.
    ///
    /// # Errors
    /// [`WriteError::SessionNotFound`] for an unknown session id.
    pub fn session_info(&self, session_id: &str) -> Result<ChunkSessionInfo> {
        let session = self
            .sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| WriteError::SessionNotFound(session_id.to_string()))?;

        let state = session.state.lock();
        Ok(ChunkSessionInfo {
            session_id: session_id.to_string(),
            total_chunks: state.expected_chunks,
            received_chunks: state.received_chunks,
            temp_path: state.spool_path.clone(),
            created: true,
        })
    }

    /// Discard sessions idle for at least `max_idle`, returning how many
    /// were removed. Caller-driven; the manager never spawns its own
    /// reaper task.
    pub fn purge_idle_sessions(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write();
        let now = Instant::now();

        let stale: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| {
                let state = session.state.lock();
                now.duration_since(state.last_activity) >= max_idle
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            if let Some(session) = sessions.remove(id) {
                let mut state = session.state.lock();
                drop(state.spool.take());
                tracing::info!(session = id.as_str(), "purged idle chunk session");
            }
        }

        stale.len()
    }

    /// Look up a session, lazily creating it (with a fresh spool file)
    /// under the map write lock.
    fn session_or_create(&self, session_id: &str) -> Result<Arc<ChunkSession>> {
        if let Some(session) = self.sessions.read().get(session_id) {
            return Ok(Arc::clone(session));
        }

        let mut sessions = self.sessions.write();
        // A racing creator may have won between the two locks.
        if let Some(session) = sessions.get(session_id) {
            return Ok(Arc::clone(session));
        }

        fs::create_dir_all(&self.spool_dir)
            .map_err(|source| WriteError::io("create spool directory", &self.spool_dir, source))?;

        let spool = tempfile::Builder::new()
            .prefix(&format!("chunk_session_{session_id}_"))
            .tempfile_in(&self.spool_dir)
            .map_err(|source| WriteError::io("create spool file in", &self.spool_dir, source))?;
        let spool_path = spool.path().to_path_buf();

        tracing::debug!(
            session = session_id,
            spool = %spool_path.display(),
            "chunk session opened"
        );

        let session = Arc::new(ChunkSession {
            state: Mutex::new(SessionState {
                spool: Some(BufWriter::new(spool)),
                spool_path,
                expected_chunks: None,
                received_chunks: 0,
                last_activity: Instant::now(),
            }),
        });
        sessions.insert(session_id.to_string(), Arc::clone(&session));
        Ok(session)
    }
}
