//! Path validation
//!
//! [`PathValidator`] is the leaf authority on whether a candidate path may
//! be touched at all: it rejects empty, traversing, and null-byte paths,
//! anything outside the configured sandbox, and anything matching the
//! protected-pattern list. It can also probe writability without ever
//! creating the real target.

use std::fs::OpenOptions;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::{SandboxConfig, CONFIG_DIR_NAME};
use crate::error::{Result, WriteError};
use crate::paths;

/// Patterns that are always protected, regardless of configuration.
///
/// Matching is both substring-on-normalized-path and glob-against-final-
/// component, so `secrets/id_rsa` and `./server.key` are both caught.
pub const DEFAULT_PROTECTED_PATTERNS: &[&str] = &[
    ".git/",
    ".env",
    ".environment",
    "*.key",
    "*.pem",
    "id_rsa",
    "id_dsa",
    "id_ecdsa",
    "id_ed25519",
];

/// Decides whether a candidate path is legal to touch.
#[derive(Debug)]
pub struct PathValidator {
    sandbox: SandboxConfig,
    patterns: Vec<String>,
    filename_globs: GlobSet,
}

impl PathValidator {
    /// Build a validator for the given sandbox, merging any configured
    /// extra protected patterns with the built-in list.
    ///
    /// # Errors
    /// [`WriteError::InvalidProtectedPattern`] if a configured pattern is
    /// not valid glob syntax.
    pub fn new(sandbox: SandboxConfig) -> Result<Self> {
        let mut patterns: Vec<String> = Vec::with_capacity(
            DEFAULT_PROTECTED_PATTERNS.len() + sandbox.protected_paths.len() + 1,
        );
        patterns.push(format!("{CONFIG_DIR_NAME}/"));
        patterns.extend(DEFAULT_PROTECTED_PATTERNS.iter().map(ToString::to_string));
        patterns.extend(sandbox.protected_paths.iter().cloned());

        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob = Glob::new(pattern).map_err(|source| WriteError::InvalidProtectedPattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let filename_globs =
            builder
                .build()
                .map_err(|source| WriteError::InvalidProtectedPattern {
                    pattern: String::new(),
                    source,
                })?;

        Ok(Self {
            sandbox,
            patterns,
            filename_globs,
        })
    }

    /// Check that a path is valid and secure for file operations.
    ///
    /// # Errors
    /// An authorization error naming the first violated rule; see
    /// [`WriteError`] for the full set.
    pub fn validate(&self, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(WriteError::EmptyPath);
        }

        if path.as_os_str().as_encoded_bytes().contains(&0) {
            return Err(WriteError::NullByte {
                path: path.to_path_buf(),
            });
        }

        if path
            .components()
            .any(|component| matches!(component, Component::ParentDir))
        {
            return Err(WriteError::PathTraversal {
                path: path.to_path_buf(),
            });
        }

        let abs_path = paths::absolutize(path)
            .map_err(|source| WriteError::io("resolve absolute path for", path, source))?;

        self.sandbox.ensure_in_sandbox(&abs_path)?;

        if self.is_protected(&abs_path) {
            return Err(WriteError::ProtectedPath {
                path: path.to_path_buf(),
            });
        }

        Ok(())
    }

    /// Non-destructive writability probe.
    ///
    /// An existing target is opened for writing and closed again. A missing
    /// target is probed by walking upward to the first existing ancestor
    /// and creating-then-removing a uniquely named probe directory there.
    /// Returns false if validation itself fails or any probe step errors.
    #[must_use]
    pub fn is_writable(&self, path: &Path) -> bool {
        if self.validate(path).is_err() {
            return false;
        }

        let Ok(abs_path) = paths::absolutize(path) else {
            return false;
        };

        if abs_path.exists() {
            return OpenOptions::new().write(true).open(&abs_path).is_ok();
        }

        let mut ancestor = abs_path.parent();
        while let Some(dir) = ancestor {
            if dir.exists() {
                return probe_create_dir(dir);
            }
            ancestor = dir.parent();
        }

        false
    }

    /// Pure sandbox-membership predicate, without the rejection-reason
    /// error of [`Self::validate`].
    #[must_use]
    pub fn is_in_sandbox(&self, path: &Path) -> bool {
        let Ok(abs_path) = paths::absolutize(path) else {
            return false;
        };
        self.sandbox.ensure_in_sandbox(&abs_path).is_ok()
    }

    /// Check the path against the protected-pattern list.
    fn is_protected(&self, abs_path: &Path) -> bool {
        let normalized = abs_path.to_string_lossy();

        for pattern in &self.patterns {
            if normalized.contains(pattern.as_str()) {
                return true;
            }
        }

        abs_path
            .file_name()
            .is_some_and(|name| self.filename_globs.is_match(Path::new(name)))
    }
}

/// Create and remove a uniquely named probe directory in `dir`.
fn probe_create_dir(dir: &Path) -> bool {
    let probe = dir.join(format!(".mkdir_probe_{}", uuid::Uuid::new_v4().simple()));
    if std::fs::create_dir(&probe).is_err() {
        return false;
    }
    if let Err(error) = std::fs::remove_dir(&probe) {
        tracing::warn!(
            path = %probe.display(),
            %error,
            "failed to remove probe directory during writability test"
        );
        return false;
    }
    true
}
