//! Pseudo-filesystem bind mounts for the chroot.
//!
//! [`MountGuard`] binds `/proc`, `/sys` and `/dev` into a workspace rootfs
//! and detaches them again in reverse order when dropped, on success, error
//! and interrupt paths alike.

use std::path::{Path, PathBuf};

use ctforge_common::constants::PSEUDO_FILESYSTEMS;
use ctforge_common::error::{ForgeError, Result};

use super::workspace::ScratchWorkspace;

/// Mount primitives used by the guard.
pub trait Mounter {
    /// Recursively bind-mounts `source` onto `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount syscall fails.
    fn bind(&self, source: &Path, target: &Path) -> Result<()>;

    /// Detaches the mount at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount syscall fails.
    fn unmount(&self, target: &Path) -> Result<()>;
}

/// [`Mounter`] issuing real `mount(2)` / `umount2(2)` calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMounter;

#[cfg(target_os = "linux")]
impl Mounter for SystemMounter {
    fn bind(&self, source: &Path, target: &Path) -> Result<()> {
        use nix::mount::{MsFlags, mount};

        mount(
            Some(source),
            target,
            None::<&str>,
            MsFlags::MS_BIND | MsFlags::MS_REC,
            None::<&str>,
        )
        .map_err(|e| ForgeError::PermissionDenied {
            message: format!(
                "bind mount {} -> {} failed: {e}",
                source.display(),
                target.display()
            ),
        })?;

        // The host root is usually rshared; unmounting a peer would take the
        // host's own submounts (/dev/pts, /sys/fs/cgroup) with it.
        if let Err(e) = mount(
            None::<&str>,
            target,
            None::<&str>,
            MsFlags::MS_SLAVE | MsFlags::MS_REC,
            None::<&str>,
        ) {
            // Detaching a still-shared bind would propagate, so it stays
            // mounted and the workspace keeps its directory.
            return Err(ForgeError::PermissionDenied {
                message: format!("make-rslave {} failed: {e}", target.display()),
            });
        }
        tracing::debug!(source = %source.display(), target = %target.display(), "bind mounted");
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        nix::mount::umount2(target, nix::mount::MntFlags::MNT_DETACH).map_err(|e| {
            ForgeError::PermissionDenied {
                message: format!("unmount {} failed: {e}", target.display()),
            }
        })?;
        tracing::debug!(target = %target.display(), "unmounted");
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl Mounter for SystemMounter {
    fn bind(&self, _source: &Path, _target: &Path) -> Result<()> {
        Err(ForgeError::Config {
            message: "Linux required for bind mounts".into(),
        })
    }

    fn unmount(&self, _target: &Path) -> Result<()> {
        Err(ForgeError::Config {
            message: "Linux required for bind mounts".into(),
        })
    }
}

/// Active pseudo-filesystem mounts inside a workspace rootfs.
pub struct MountGuard<'a> {
    mounter: &'a dyn Mounter,
    workspace: &'a ScratchWorkspace,
    mounted: Vec<PathBuf>,
}

impl<'a> MountGuard<'a> {
    /// Bind-mounts the host's `/proc`, `/sys` and `/dev` into the
    /// workspace rootfs.
    ///
    /// Mounts established before a failure are detached before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if a mount point cannot be created or a mount fails.
    pub fn mount_pseudo_filesystems(
        mounter: &'a dyn Mounter,
        workspace: &'a ScratchWorkspace,
    ) -> Result<Self> {
        let mut guard = Self {
            mounter,
            workspace,
            mounted: Vec::with_capacity(PSEUDO_FILESYSTEMS.len()),
        };
        for fs in PSEUDO_FILESYSTEMS {
            let target = workspace.rootfs().join(fs);
            std::fs::create_dir_all(&target).map_err(|e| ForgeError::io(&target, e))?;
            mounter.bind(&Path::new("/").join(fs), &target)?;
            guard.mounted.push(target);
        }
        tracing::info!(rootfs = %workspace.rootfs().display(), "pseudo-filesystems mounted");
        Ok(guard)
    }

    /// Mount points currently held, in mount order.
    #[must_use]
    pub fn mounted(&self) -> &[PathBuf] {
        &self.mounted
    }

    /// Detaches every mount in reverse order.
    ///
    /// All mounts are attempted even if one fails; the workspace is told
    /// about any leak so it will not delete through a live mount.
    ///
    /// # Errors
    ///
    /// Returns the first unmount failure.
    pub fn release(mut self) -> Result<()> {
        self.unmount_all()
    }

    fn unmount_all(&mut self) -> Result<()> {
        let mut first_err = None;
        while let Some(target) = self.mounted.pop() {
            if let Err(e) = self.mounter.unmount(&target) {
                tracing::error!(target = %target.display(), error = %e, "failed to unmount");
                self.workspace.mark_mount_leak();
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        let _ = self.unmount_all();
    }
}

/// Lists mount points from `/proc/self/mountinfo` content that lie under
/// `root`.
#[must_use]
pub fn mounts_under(mountinfo: &str, root: &Path) -> Vec<PathBuf> {
    mountinfo
        .lines()
        .filter_map(|line| line.split_whitespace().nth(4))
        .map(|field| PathBuf::from(unescape_mountinfo(field)))
        .filter(|mount_point| mount_point.starts_with(root))
        .collect()
}

/// Reads the live mount table and returns mounts under `root`.
///
/// An unreadable mount table yields an empty list.
#[must_use]
pub fn live_mounts_under(root: &Path) -> Vec<PathBuf> {
    std::fs::read_to_string("/proc/self/mountinfo")
        .map(|content| mounts_under(&content, root))
        .unwrap_or_default()
}

/// Decodes the octal escapes (`\040` for space) used in mountinfo.
fn unescape_mountinfo(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let value = std::str::from_utf8(&bytes[i + 1..i + 4])
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 8).ok());
            if let Some(value) = value {
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
