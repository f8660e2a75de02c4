//! Removing build residue from the rootfs before it is packed.

use std::path::Path;

use ctforge_common::constants::{CUSTOMIZE_SCRIPT, RESOLVED_RUNTIME_DIR, RESOLVED_STUB_FILE};
use ctforge_common::distro::DistroProfile;
use ctforge_common::error::{ForgeError, Result};

use crate::confine::confined;

/// Scratch directories emptied in every template.
pub const SCRATCH_DIRS: [&str; 2] = ["tmp", "var/tmp"];

/// Writes the resolver stub the chroot script copies into `/etc/resolv.conf`.
///
/// # Errors
///
/// Returns an I/O error if the runtime directory or file cannot be written,
/// and [`ForgeError::PermissionDenied`] if either resolves outside the
/// rootfs.
pub fn write_resolver_stub(rootfs: &Path, nameserver: &str) -> Result<()> {
    let dir = confined(rootfs, RESOLVED_RUNTIME_DIR)?;
    std::fs::create_dir_all(&dir).map_err(|e| ForgeError::io(&dir, e))?;
    let stub = confined(rootfs, RESOLVED_STUB_FILE)?;
    std::fs::write(&stub, format!("nameserver {nameserver}\n"))
        .map_err(|e| ForgeError::io(&stub, e))?;
    tracing::debug!(nameserver, path = %stub.display(), "resolver stub written");
    Ok(())
}

/// Removes everything inside `dir`, keeping `dir` itself. A missing `dir`
/// is fine.
///
/// # Errors
///
/// Returns an I/O error if an entry cannot be removed.
pub fn empty_dir(dir: &Path) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(ForgeError::io(dir, e)),
    };
    for entry in entries {
        let path = entry.map_err(|e| ForgeError::io(dir, e))?.path();
        let meta = std::fs::symlink_metadata(&path).map_err(|e| ForgeError::io(&path, e))?;
        if meta.is_dir() {
            std::fs::remove_dir_all(&path).map_err(|e| ForgeError::io(&path, e))?;
        } else {
            std::fs::remove_file(&path).map_err(|e| ForgeError::io(&path, e))?;
        }
    }
    Ok(())
}

/// Empties the package caches and scratch directories.
///
/// # Errors
///
/// Returns an I/O error if a directory cannot be emptied, and
/// [`ForgeError::PermissionDenied`] if one resolves outside the rootfs.
pub fn purge_caches(rootfs: &Path, profile: &DistroProfile) -> Result<()> {
    for rel in profile.cache_dirs.iter().chain(SCRATCH_DIRS.iter()) {
        empty_dir(&confined(rootfs, rel)?)?;
    }
    tracing::info!(dirs = profile.cache_dirs.len() + SCRATCH_DIRS.len(), "caches purged");
    Ok(())
}

/// Removes the customization script and the resolver runtime directory.
///
/// # Errors
///
/// Returns an I/O error if either exists but cannot be removed, and
/// [`ForgeError::PermissionDenied`] if either resolves outside the rootfs.
pub fn remove_injected(rootfs: &Path) -> Result<()> {
    let script = confined(rootfs, CUSTOMIZE_SCRIPT)?;
    match std::fs::remove_file(&script) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(ForgeError::io(&script, e)),
    }
    let resolved = confined(rootfs, RESOLVED_RUNTIME_DIR)?;
    match std::fs::remove_dir_all(&resolved) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(ForgeError::io(&resolved, e)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ctforge_common::distro::Distro;

    use super::*;

    #[test]
    fn resolver_stub_holds_single_nameserver() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_resolver_stub(dir.path(), "9.9.9.9").expect("write");
        let stub = std::fs::read_to_string(dir.path().join(RESOLVED_STUB_FILE)).expect("read");
        assert_eq!(stub, "nameserver 9.9.9.9\n");
    }

    #[test]
    fn empty_dir_keeps_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("cache");
        std::fs::create_dir_all(target.join("partial")).expect("mkdir");
        std::fs::write(target.join("pkg.deb"), b"deb").expect("write");
        std::os::unix::fs::symlink("/nonexistent", target.join("dangling")).expect("symlink");

        empty_dir(&target).expect("empty");
        assert!(target.is_dir());
        assert_eq!(std::fs::read_dir(&target).expect("read_dir").count(), 0);
    }

    #[test]
    fn empty_dir_does_not_follow_symlinked_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&outside).expect("mkdir");
        std::fs::write(outside.join("keep"), b"x").expect("write");
        let target = dir.path().join("tmp");
        std::fs::create_dir_all(&target).expect("mkdir");
        std::os::unix::fs::symlink(&outside, target.join("link")).expect("symlink");

        empty_dir(&target).expect("empty");
        assert!(outside.join("keep").exists());
    }

    #[test]
    fn purge_caches_empties_profile_and_scratch_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        for rel in ["var/cache/apt/archives", "var/lib/apt/lists", "tmp", "var/tmp"] {
            std::fs::create_dir_all(root.join(rel)).expect("mkdir");
            std::fs::write(root.join(rel).join("junk"), b"x").expect("write");
        }
        purge_caches(root, Distro::Ubuntu.profile()).expect("purge");
        for rel in ["var/cache/apt/archives", "var/lib/apt/lists", "tmp", "var/tmp"] {
            assert!(!root.join(rel).join("junk").exists(), "{rel} not purged");
        }
    }

    #[test]
    fn purge_caches_refuses_scratch_dir_linked_to_host() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("rootfs");
        let host_tmp = dir.path().join("host-tmp");
        std::fs::create_dir_all(root.join("var")).expect("mkdir");
        std::fs::create_dir_all(&host_tmp).expect("mkdir");
        std::fs::write(host_tmp.join("host-file"), b"keep").expect("write");
        std::os::unix::fs::symlink(&host_tmp, root.join("var/tmp")).expect("symlink");

        let err = purge_caches(&root, Distro::Fedora.profile()).expect_err("escape");
        assert!(matches!(err, ForgeError::PermissionDenied { .. }));
        assert!(host_tmp.join("host-file").exists());
    }

    #[test]
    fn resolver_stub_is_not_written_through_linked_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("rootfs");
        let host_run = dir.path().join("host-run");
        std::fs::create_dir_all(&root).expect("mkdir");
        std::fs::create_dir_all(&host_run).expect("mkdir");
        std::os::unix::fs::symlink(&host_run, root.join("run")).expect("symlink");

        assert!(write_resolver_stub(&root, "9.9.9.9").is_err());
        assert!(remove_injected(&root).is_err());
        assert_eq!(std::fs::read_dir(&host_run).expect("read_dir").count(), 0);
    }

    #[test]
    fn remove_injected_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_resolver_stub(dir.path(), "1.1.1.1").expect("stub");
        std::fs::create_dir_all(dir.path().join("tmp")).expect("mkdir");
        std::fs::write(dir.path().join(CUSTOMIZE_SCRIPT), "#!/bin/bash\n").expect("script");

        remove_injected(dir.path()).expect("first");
        assert!(!dir.path().join(CUSTOMIZE_SCRIPT).exists());
        assert!(!dir.path().join(RESOLVED_RUNTIME_DIR).exists());
        remove_injected(dir.path()).expect("second");
    }
}
