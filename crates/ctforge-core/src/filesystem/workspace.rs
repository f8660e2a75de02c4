//! Scratch workspace for one build run.
//!
//! The workspace is a uniquely named temporary directory holding the
//! extracted `rootfs/`. It is removed when dropped, unless a bind mount
//! underneath it could not be detached: recursive deletion through a live
//! `/dev` or `/sys` bind would reach into the host.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use ctforge_common::constants::WORKSPACE_PREFIX;
use ctforge_common::error::{ForgeError, Result};
use tempfile::TempDir;

/// Base directory for workspaces; `/var/tmp` is disk-backed on most hosts.
pub const DEFAULT_WORKSPACE_BASE: &str = "/var/tmp";

/// Temporary directory tree used to extract, modify and repack one image.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: Option<TempDir>,
    path: PathBuf,
    mount_leak: Cell<bool>,
}

impl ScratchWorkspace {
    /// Creates a workspace under `base`, normally
    /// [`DEFAULT_WORKSPACE_BASE`].
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create_in(base: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(base)
            .map_err(|e| ForgeError::io(base, e))?;
        let path = dir.path().to_path_buf();
        tracing::info!(path = %path.display(), "created scratch workspace");
        Ok(Self {
            dir: Some(dir),
            path,
            mount_leak: Cell::new(false),
        })
    }

    /// Workspace root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the base template is extracted into.
    #[must_use]
    pub fn rootfs(&self) -> PathBuf {
        self.path.join("rootfs")
    }

    /// Records that a mount under this workspace is still attached.
    pub fn mark_mount_leak(&self) {
        self.mount_leak.set(true);
    }

    /// Whether a mount leak was recorded.
    #[must_use]
    pub fn has_mount_leak(&self) -> bool {
        self.mount_leak.get()
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let live = super::mount::live_mounts_under(&self.path);
        if self.has_mount_leak() || !live.is_empty() {
            let kept = dir.keep();
            tracing::error!(
                path = %kept.display(),
                mounts = ?live,
                "mounts still attached; keeping workspace for manual cleanup"
            );
            return;
        }
        match dir.close() {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed scratch workspace"),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove workspace");
            }
        }
    }
}
