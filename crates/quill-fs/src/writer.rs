//! Atomic file writes
//!
//! [`SafeFileWriter`] performs one atomic content write: validate, resolve,
//! optionally back up, then write to a uniquely named temp file in the
//! target's own directory and rename it into place. The rename is the only
//! mutation of the target's directory entry, so a reader can never observe
//! a partially written file. A failure after a backup was taken restores
//! the backup before the error is returned.

use std::fs;
use std::hash::{Hash, Hasher};
use std::io::Write as _;
use std::path::Path;

use parking_lot::{Mutex, MutexGuard};

use crate::backup::BackupManager;
use crate::config::WriterConfig;
use crate::error::{Result, WriteError};
use crate::paths;
use crate::types::{WriteRequest, WriteResult};
use crate::validator::PathValidator;

/// Number of stripes in the per-path lock table.
const LOCK_STRIPES: usize = 64;

/// The seam the chunk manager (and tests) write through.
pub trait FileWriter: Send + Sync {
    /// Perform one atomic write.
    ///
    /// # Errors
    /// See [`WriteError`]; on failure the target file is unchanged.
    fn write(&self, request: WriteRequest) -> Result<WriteResult>;
}

/// Striped mutual exclusion keyed by resolved target path.
///
/// Racing writers of the same path serialize their whole
/// validate→backup→write sequence; unrelated paths rarely share a stripe.
#[derive(Debug)]
struct PathLocks {
    stripes: Vec<Mutex<()>>,
}

impl PathLocks {
    fn new() -> Self {
        Self {
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn lock(&self, path: &Path) -> MutexGuard<'_, ()> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        path.hash(&mut hasher);
        let index = usize::try_from(hasher.finish() % LOCK_STRIPES as u64).unwrap_or(0);
        self.stripes[index].lock()
    }
}

/// Performs one atomic content write with validation and rollback safety.
#[derive(Debug)]
pub struct SafeFileWriter {
    validator: PathValidator,
    backups: BackupManager,
    locks: PathLocks,
    #[cfg(test)]
    fail_rename: std::sync::atomic::AtomicBool,
}

impl SafeFileWriter {
    /// Writer composed from an existing validator and backup manager.
    #[must_use]
    pub fn new(validator: PathValidator, backups: BackupManager) -> Self {
        Self {
            validator,
            backups,
            locks: PathLocks::new(),
            #[cfg(test)]
            fail_rename: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Writer built from configuration.
    ///
    /// # Errors
    /// Fails if a configured protected pattern does not compile.
    pub fn from_config(config: &WriterConfig) -> Result<Self> {
        Ok(Self::new(
            PathValidator::new(config.sandbox.clone())?,
            BackupManager::new(config.backup_root.clone()),
        ))
    }

    /// Check whether a path is safe for writing, without touching it.
    ///
    /// # Errors
    /// The first violated authorization rule.
    pub fn validate_path(&self, path: &Path) -> Result<()> {
        self.validator.validate(path)
    }

    /// Perform one atomic write per the request.
    ///
    /// On failure the visible file state is either unchanged from before
    /// the call (backup restored) or unchanged because nothing was ever
    /// renamed into place.
    ///
    /// # Errors
    /// See [`WriteError`]. A post-backup failure whose restore also fails
    /// surfaces both as [`WriteError::RollbackFailed`].
    pub fn write(&self, request: WriteRequest) -> Result<WriteResult> {
        self.validator.validate(&request.path)?;

        let abs_path = paths::absolutize(&request.path)
            .map_err(|source| WriteError::io("resolve absolute path for", &request.path, source))?;

        let _path_guard = self.locks.lock(&abs_path);

        let exists = abs_path.exists();
        let created = !exists;

        if exists && !request.overwrite {
            return Err(WriteError::AlreadyExists { path: abs_path });
        }

        let backup_path = if request.backup && exists {
            self.backups.create_backup(&abs_path)?
        } else {
            None
        };

        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| WriteError::io("create parent directory", parent, source))?;
        }

        if let Err(write_error) = self.write_atomically(&abs_path, &request.content) {
            if let Some(backup) = &backup_path {
                if let Err(restore_error) = self.backups.restore_backup(backup, &abs_path) {
                    tracing::error!(
                        path = %abs_path.display(),
                        %write_error,
                        %restore_error,
                        "write failed and backup restore failed"
                    );
                    return Err(WriteError::RollbackFailed {
                        write_error: Box::new(write_error),
                        restore_error: Box::new(restore_error),
                    });
                }
                tracing::warn!(
                    path = %abs_path.display(),
                    backup = %backup.display(),
                    "write failed, backup restored"
                );
            }
            return Err(write_error);
        }

        let bytes_written = request.content.len() as u64;
        tracing::debug!(
            path = %abs_path.display(),
            bytes = bytes_written,
            created,
            "file written"
        );

        Ok(WriteResult {
            path: abs_path,
            bytes_written,
            created,
            backup_path,
        })
    }

    /// Write `content` to a temp file next to the target, sync it, and
    /// rename it into place. Any failure removes the temp file.
    fn write_atomically(&self, target: &Path, content: &str) -> Result<()> {
        let dir = target
            .parent()
            .ok_or_else(|| WriteError::io(
                "resolve parent directory of",
                target,
                std::io::Error::other("target has no parent directory"),
            ))?;
        let basename = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".tmp_{basename}_"))
            .tempfile_in(dir)
            .map_err(|source| WriteError::io("create temp file in", dir, source))?;

        temp.write_all(content.as_bytes())
            .map_err(|source| WriteError::io("write to temp file", temp.path(), source))?;

        temp.as_file()
            .sync_all()
            .map_err(|source| WriteError::io("sync temp file", temp.path(), source))?;

        #[cfg(test)]
        if self.fail_rename.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(WriteError::io(
                "rename temp file onto",
                target,
                std::io::Error::other("injected rename failure"),
            ));
        }

        temp.persist(target).map_err(|persist_error| {
            WriteError::io("rename temp file onto", target, persist_error.error)
        })?;

        Ok(())
    }
}

impl FileWriter for SafeFileWriter {
    fn write(&self, request: WriteRequest) -> Result<WriteResult> {
        SafeFileWriter::write(self, request)
    }
}
