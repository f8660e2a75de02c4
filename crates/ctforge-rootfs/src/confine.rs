//! Keeping host-side edits inside the rootfs.
//!
//! The guest's paths are joined onto the rootfs from the host, where an
//! absolute symlink such as `var/tmp -> /tmp` resolves against the host's
//! root. Every edit made from the host goes through [`confined`] first.

use std::path::{Component, Path, PathBuf};

use ctforge_common::error::{ForgeError, Result};

fn escape(rootfs: &Path, rel: &Path) -> ForgeError {
    ForgeError::PermissionDenied {
        message: format!(
            "{} resolves outside the rootfs {}",
            rel.display(),
            rootfs.display()
        ),
    }
}

/// Joins `rel` onto `rootfs`, checking that the deepest existing part of
/// the result resolves inside `rootfs`.
///
/// Components that do not exist yet are created by the caller as plain
/// directories and files, so they cannot escape.
///
/// # Errors
///
/// Returns [`ForgeError::PermissionDenied`] if `rel` is not a plain
/// relative path, or an existing prefix of it (including the path itself)
/// resolves outside `rootfs` or is a dangling symlink. Returns an I/O
/// error if `rootfs` cannot be resolved.
pub fn confined(rootfs: &Path, rel: impl AsRef<Path>) -> Result<PathBuf> {
    let rel = rel.as_ref();
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(escape(rootfs, rel));
    }
    let root = rootfs.canonicalize().map_err(|e| ForgeError::io(rootfs, e))?;
    let path = rootfs.join(rel);

    for candidate in path.ancestors() {
        match candidate.canonicalize() {
            Ok(resolved) if resolved.starts_with(&root) => return Ok(path),
            Ok(_) => return Err(escape(rootfs, rel)),
            Err(_) if std::fs::symlink_metadata(candidate).is_ok() => {
                return Err(escape(rootfs, rel));
            }
            Err(_) => {}
        }
    }
    Err(escape(rootfs, rel))
}
