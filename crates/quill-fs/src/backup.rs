//! Backup snapshots
//!
//! [`BackupManager`] snapshots and restores a single file under a
//! dedicated backup root. Backups are named
//! `<basename>.<YYYYMMDD_HHMMSS>.backup` and carry the original's
//! permission bits on a best-effort basis. Cleanup refuses any path that
//! does not resolve inside the backup root, since it is reachable from
//! rollback logic driven by runtime state.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use crate::error::{Result, WriteError};
use crate::paths;

/// Snapshots and restores a single file under a dedicated backup root.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_root: PathBuf,
}

impl BackupManager {
    /// Manager storing backups under `backup_root`.
    #[inline]
    #[must_use]
    pub fn new(backup_root: impl Into<PathBuf>) -> Self {
        Self {
            backup_root: backup_root.into(),
        }
    }

    /// The directory all backups live under.
    #[inline]
    #[must_use]
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Snapshot `original` into the backup root.
    ///
    /// Backing up a nonexistent file is a no-op success returning
    /// `Ok(None)`. A permission-copy failure is non-fatal; the backup
    /// content itself is still valid.
    ///
    /// # Errors
    /// I/O errors from statting the original, creating the backup root, or
    /// copying the content.
    pub fn create_backup(&self, original: &Path) -> Result<Option<PathBuf>> {
        let metadata = match fs::metadata(original) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(WriteError::io("stat original file", original, source)),
        };

        fs::create_dir_all(&self.backup_root)
            .map_err(|source| WriteError::io("create backup directory", &self.backup_root, source))?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let basename = original
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let backup_path = self
            .backup_root
            .join(format!("{basename}.{timestamp}.backup"));

        copy_contents(original, &backup_path)?;

        if let Err(error) = fs::set_permissions(&backup_path, metadata.permissions()) {
            tracing::warn!(
                path = %backup_path.display(),
                %error,
                "failed to replicate permissions onto backup"
            );
        }

        Ok(Some(backup_path))
    }

    /// Copy a backup's content back over `original`, creating parent
    /// directories as needed. Permissions are restored best-effort.
    ///
    /// # Errors
    /// [`WriteError::BackupMissing`] if the backup does not exist, or I/O
    /// errors from the copy.
    pub fn restore_backup(&self, backup_path: &Path, original: &Path) -> Result<()> {
        let metadata = match fs::metadata(backup_path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(WriteError::BackupMissing {
                    path: backup_path.to_path_buf(),
                })
            }
            Err(source) => return Err(WriteError::io("stat backup file", backup_path, source)),
        };

        if let Some(parent) = original.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| WriteError::io("create target directory", parent, source))?;
        }

        copy_contents(backup_path, original)?;

        if let Err(error) = fs::set_permissions(original, metadata.permissions()) {
            tracing::warn!(
                path = %original.display(),
                %error,
                "failed to restore permissions from backup"
            );
        }

        Ok(())
    }

    /// Delete a backup file.
    ///
    /// An empty path is a no-op. Removal of an already-deleted backup
    /// succeeds.
    ///
    /// # Errors
    /// [`WriteError::OutsideBackupRoot`] for any path that does not resolve
    /// inside the backup root; I/O errors from removal.
    pub fn cleanup_backup(&self, backup_path: &Path) -> Result<()> {
        if backup_path.as_os_str().is_empty() {
            return Ok(());
        }

        if !paths::is_contained_in(backup_path, &self.backup_root) {
            return Err(WriteError::OutsideBackupRoot {
                path: backup_path.to_path_buf(),
            });
        }

        match fs::remove_file(backup_path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WriteError::io("remove backup file", backup_path, source)),
        }
    }
}

/// Copy `src` to `dst` and sync the destination to durable storage.
fn copy_contents(src: &Path, dst: &Path) -> Result<()> {
    let mut source = fs::File::open(src).map_err(|s| WriteError::io("open source file", src, s))?;
    let mut dest =
        fs::File::create(dst).map_err(|s| WriteError::io("create destination file", dst, s))?;
    io::copy(&mut source, &mut dest)
        .map_err(|s| WriteError::io("copy file content", dst, s))?;
    dest.sync_all()
        .map_err(|s| WriteError::io("sync destination file", dst, s))?;
    Ok(())
}
