//! Error types for quill-fs
//!
//! Every failure in this crate is a returned [`WriteError`]; nothing here
//! panics or aborts the host process. Errors fall into four categories
//! (see [`ErrorKind`]):
//! - Authorization: the path may not be touched at all
//! - Precondition: the operation does not apply to the current state
//! - Io: a filesystem operation failed
//! - Consistency: streamed input violated its ordering/completeness contract

use std::io;
use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T, E = WriteError> = std::result::Result<T, E>;

/// Main error type for all file-mutation operations.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Path is empty
    #[error("path cannot be empty")]
    EmptyPath,

    /// Path contains a parent-directory traversal segment
    #[error("path traversal attempts are not allowed: {}", path.display())]
    PathTraversal {
        /// The offending path as given by the caller
        path: PathBuf,
    },

    /// Path contains an embedded null byte
    #[error("path contains null bytes: {}", path.display())]
    NullByte {
        /// The offending path as given by the caller
        path: PathBuf,
    },

    /// No sandbox directories are configured at all
    #[error("no sandbox directories configured")]
    NoSandboxConfigured,

    /// Resolved path falls outside every configured sandbox directory
    #[error("path '{}' is outside configured sandbox directories", path.display())]
    OutsideSandbox {
        /// The resolved absolute path
        path: PathBuf,
    },

    /// Path matches the protected-pattern list
    #[error("path is protected and cannot be modified: {}", path.display())]
    ProtectedPath {
        /// The offending path
        path: PathBuf,
    },

    /// A protected-pattern entry could not be compiled
    #[error("invalid protected pattern '{pattern}': {source}")]
    InvalidProtectedPattern {
        /// The pattern that failed to compile
        pattern: String,
        /// Underlying glob error
        source: globset::Error,
    },

    /// Target exists and overwrite was not requested
    #[error("file already exists and overwrite is false: {}", path.display())]
    AlreadyExists {
        /// The resolved absolute target path
        path: PathBuf,
    },

    /// No active chunk session under the given id
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Backup file missing at restore time
    #[error("backup file does not exist: {}", path.display())]
    BackupMissing {
        /// The backup path that was expected to exist
        path: PathBuf,
    },

    /// Refused to delete a path outside the backup root
    #[error("refusing to delete file outside backup directory: {}", path.display())]
    OutsideBackupRoot {
        /// The refused path
        path: PathBuf,
    },

    /// A filesystem operation failed
    #[error("failed to {op} '{}': {source}", path.display())]
    Io {
        /// Short description of the failing operation
        op: &'static str,
        /// Path the operation was acting on
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// A write failed and the subsequent backup restore also failed
    #[error("write failed: {write_error}, and backup restore failed: {restore_error}")]
    RollbackFailed {
        /// The original write failure
        write_error: Box<WriteError>,
        /// The failure encountered while restoring the backup
        restore_error: Box<WriteError>,
    },

    /// Chunk arrived out of order
    #[error("chunk index mismatch: expected {expected}, got {got}")]
    ChunkIndexMismatch {
        /// The index the session expected next
        expected: u64,
        /// The index the caller supplied
        got: u64,
    },

    /// Finalize called before all declared chunks arrived
    #[error("incomplete session: expected {expected} chunks, received {received}")]
    IncompleteSession {
        /// Declared total chunk count
        expected: u64,
        /// Chunks actually received
        received: u64,
    },

    /// Spool content is not valid UTF-8 at finalize time
    #[error("session spool at '{}' is not valid UTF-8", path.display())]
    NonUtf8Content {
        /// The spool path holding the offending bytes
        path: PathBuf,
    },
}

/// Coarse classification of a [`WriteError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The path is categorically off-limits; never retried
    Authorization,
    /// The operation does not apply to the current state; never retried
    Precondition,
    /// A filesystem operation failed; may succeed on retry
    Io,
    /// Streamed input violated its contract; caller may retry or abort
    Consistency,
}

impl WriteError {
    /// Classify this error into its taxonomy category.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyPath
            | Self::PathTraversal { .. }
            | Self::NullByte { .. }
            | Self::NoSandboxConfigured
            | Self::OutsideSandbox { .. }
            | Self::ProtectedPath { .. } => ErrorKind::Authorization,
            Self::InvalidProtectedPattern { .. }
            | Self::AlreadyExists { .. }
            | Self::SessionNotFound(_)
            | Self::BackupMissing { .. }
            | Self::OutsideBackupRoot { .. } => ErrorKind::Precondition,
            Self::Io { .. } | Self::RollbackFailed { .. } => ErrorKind::Io,
            Self::ChunkIndexMismatch { .. }
            | Self::IncompleteSession { .. }
            | Self::NonUtf8Content { .. } => ErrorKind::Consistency,
        }
    }

    /// Check whether retrying the same call can ever succeed.
    ///
    /// Authorization and precondition failures are final; I/O failures may
    /// be transient and consistency failures can be corrected by the caller
    /// re-driving the session.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Io | ErrorKind::Consistency)
    }

    /// Shorthand for building an [`WriteError::Io`] variant.
    #[inline]
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}
