//! quill-fs: safe file mutation for agent-directed writes
//!
//! Writes untrusted, externally-directed content to the local filesystem
//! without data loss, without escaping an authorized directory set, and
//! without ever leaving a half-written file behind.
//!
//! # Components
//!
//! - [`PathValidator`]: decides whether a candidate path is legal to touch
//! - [`BackupManager`]: snapshots and restores a file under a backup root
//! - [`SafeFileWriter`]: one atomic write (temp file + same-directory
//!   rename) with backup/rollback
//! - [`StreamingChunkManager`]: accumulates ordered chunks into a spool,
//!   then finalizes through a single atomic write
//!
//! # Example
//!
//! ```rust,no_run
//! use quill_fs::{SafeFileWriter, WriteRequest, WriterConfig};
//!
//! # fn main() -> Result<(), quill_fs::WriteError> {
//! let config = WriterConfig::rooted("/work/project");
//! let writer = SafeFileWriter::from_config(&config)?;
//!
//! let result = writer.write(
//!     WriteRequest::new("/work/project/src/main.rs", "fn main() {}")
//!         .overwrite(true)
//!         .backup(true),
//! )?;
//! assert_eq!(result.bytes_written, 12);
//! # Ok(())
//! # }
//! ```
//!
//! All calls are synchronous and blocking; the crate spawns no background
//! tasks. Every failure is a returned [`WriteError`] — the contract is
//! "never silently lose or corrupt data", not "never fail".

// Core modules
mod backup;
mod chunks;
mod config;
mod error;
mod paths;
mod types;
mod validator;
mod writer;

// Re-exports
pub use backup::BackupManager;
pub use chunks::StreamingChunkManager;
pub use config::{SandboxConfig, WriterConfig, CONFIG_DIR_NAME};
pub use error::{ErrorKind, Result, WriteError};
pub use types::{ChunkSessionInfo, ChunkWriteRequest, WriteRequest, WriteResult};
pub use validator::{PathValidator, DEFAULT_PROTECTED_PATTERNS};
pub use writer::{FileWriter, SafeFileWriter};

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
