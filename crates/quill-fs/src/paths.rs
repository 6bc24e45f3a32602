//! Lexical path resolution
//!
//! Resolution here is purely lexical: the current directory is joined in
//! and `.`/`..` components are folded out without consulting the
//! filesystem. Symlinks are deliberately not followed — the sandbox and
//! backup-containment checks operate on the path as the caller named it,
//! and traversal segments are rejected outright by the validator before
//! resolution matters.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Resolve a path to an absolute, lexically normalized form.
///
/// # Errors
/// Fails only if the current directory cannot be determined for a
/// relative input.
pub(crate) fn absolutize(path: &Path) -> io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(normalize(&joined))
}

/// Fold `.` and `..` components out of an absolute path.
///
/// `..` at the filesystem root is a no-op, matching lexical `Clean`
/// semantics.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Check whether `path` resolves to a location inside `root`.
///
/// Both sides are absolutized first, so a path that only *appears* to be
/// inside the root before `..` folding is correctly rejected.
pub(crate) fn is_contained_in(path: &Path, root: &Path) -> bool {
    let (Ok(abs_path), Ok(abs_root)) = (absolutize(path), absolutize(root)) else {
        return false;
    };
    abs_path.starts_with(&abs_root)
}
