//! Configuration for the file-mutation subsystem
//!
//! Callers supply the sandbox directory set, any extra protected-path
//! patterns, the backup root, and the chunk-spool directory. Sandbox
//! membership is decided here; everything else about path legality lives
//! in [`crate::validator::PathValidator`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WriteError};
use crate::paths;

/// Directory name for this tool's own configuration and state.
pub const CONFIG_DIR_NAME: &str = ".quill";

/// Sandbox authorization: the directory set writes are confined to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Directories writes are allowed inside. Empty means nothing is
    /// authorized.
    pub directories: Vec<PathBuf>,
    /// Extra protected-path patterns, merged with the built-in list.
    #[serde(default)]
    pub protected_paths: Vec<String>,
}

impl SandboxConfig {
    /// Sandbox rooted at a single directory.
    #[inline]
    #[must_use]
    pub fn rooted(dir: impl Into<PathBuf>) -> Self {
        Self {
            directories: vec![dir.into()],
            protected_paths: Vec::new(),
        }
    }

    /// Check that an absolute path falls inside a configured sandbox
    /// directory.
    ///
    /// # Errors
    /// [`WriteError::NoSandboxConfigured`] when the directory set is empty,
    /// [`WriteError::OutsideSandbox`] when no configured root contains the
    /// path.
    pub fn ensure_in_sandbox(&self, abs_path: &Path) -> Result<()> {
        if self.directories.is_empty() {
            return Err(WriteError::NoSandboxConfigured);
        }

        for dir in &self.directories {
            if paths::is_contained_in(abs_path, dir) {
                return Ok(());
            }
        }

        Err(WriteError::OutsideSandbox {
            path: abs_path.to_path_buf(),
        })
    }
}

/// Full configuration for the writer stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Sandbox authorization settings.
    pub sandbox: SandboxConfig,
    /// Directory backups are stored under.
    pub backup_root: PathBuf,
    /// Directory chunk-session spool files are created in.
    pub spool_dir: PathBuf,
}

impl WriterConfig {
    /// Configuration sandboxed to `base_dir`, with backups and spools kept
    /// under `<base_dir>/.quill/`.
    #[must_use]
    pub fn rooted(base_dir: impl Into<PathBuf>) -> Self {
        let base = base_dir.into();
        let state_dir = base.join(CONFIG_DIR_NAME);
        Self {
            sandbox: SandboxConfig::rooted(base),
            backup_root: state_dir.join("backups"),
            spool_dir: state_dir.join("spool"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sandbox_rejects_everything() {
        let sandbox = SandboxConfig::default();
        let err = sandbox.ensure_in_sandbox(Path::new("/tmp/file")).unwrap_err();
        assert!(matches!(err, WriteError::NoSandboxConfigured));
    }

    #[test]
    fn sandbox_accepts_contained_path() {
        let sandbox = SandboxConfig::rooted("/work");
        assert!(sandbox.ensure_in_sandbox(Path::new("/work/src/main.rs")).is_ok());
    }

    #[test]
    fn sandbox_rejects_outside_path() {
        let sandbox = SandboxConfig::rooted("/work");
        let err = sandbox
            .ensure_in_sandbox(Path::new("/etc/passwd"))
            .unwrap_err();
        assert!(matches!(err, WriteError::OutsideSandbox { .. }));
    }

    #[test]
    fn sandbox_checks_all_roots() {
        let sandbox = SandboxConfig {
            directories: vec![PathBuf::from("/work"), PathBuf::from("/scratch")],
            protected_paths: Vec::new(),
        };
        assert!(sandbox.ensure_in_sandbox(Path::new("/scratch/out.txt")).is_ok());
    }

    #[test]
    fn rooted_config_derives_state_dirs() {
        let config = WriterConfig::rooted("/work");
        assert_eq!(config.backup_root, PathBuf::from("/work/.quill/backups"));
        assert_eq!(config.spool_dir, PathBuf::from("/work/.quill/spool"));
        assert_eq!(config.sandbox.directories, vec![PathBuf::from("/work")]);
    }

    #[test]
    fn sandbox_config_round_trips_through_serde() {
        let sandbox = SandboxConfig {
            directories: vec![PathBuf::from("/work")],
            protected_paths: vec!["*.sqlite".to_string()],
        };
        let json = serde_json::to_string(&sandbox).unwrap();
        let back: SandboxConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.directories, sandbox.directories);
        assert_eq!(back.protected_paths, sandbox.protected_paths);
    }
}
