//! systemd unit activation state edited directly on disk.
//!
//! `systemctl` inside the chroot handles the common case; these helpers
//! remove enablement symlinks it may leave behind and pin the result with
//! a preset override so first-boot preset application cannot undo it.

use std::path::{Path, PathBuf};

use ctforge_common::constants::PRESET_OVERRIDE_FILE;
use ctforge_common::distro::DistroProfile;
use ctforge_common::error::{ForgeError, Result};

use crate::confine::confined;

/// Host-relative directory holding admin unit configuration.
pub const SYSTEM_UNIT_DIR: &str = "etc/systemd/system";

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

fn remove_link(path: &Path) -> Result<()> {
    std::fs::remove_file(path).map_err(|e| ForgeError::io(path, e))?;
    tracing::debug!(path = %path.display(), "removed unit link");
    Ok(())
}

/// Removes every `*.wants` / `*.requires` symlink for `unit`.
///
/// # Errors
///
/// Returns an I/O error if the unit directory cannot be listed or a link
/// cannot be removed, and [`ForgeError::PermissionDenied`] if a directory
/// resolves outside the rootfs.
pub fn remove_activation_links(rootfs: &Path, unit: &str) -> Result<Vec<PathBuf>> {
    let base = confined(rootfs, SYSTEM_UNIT_DIR)?;
    let mut removed = Vec::new();
    if !base.is_dir() {
        return Ok(removed);
    }

    let entries = std::fs::read_dir(&base).map_err(|e| ForgeError::io(&base, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ForgeError::io(&base, e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.ends_with(".wants") || name.ends_with(".requires")) {
            continue;
        }
        let wants = confined(rootfs, Path::new(SYSTEM_UNIT_DIR).join(&*name))?;
        let link = wants.join(unit);
        if is_symlink(&link) {
            remove_link(&link)?;
            removed.push(link);
        }
    }
    removed.sort();
    Ok(removed)
}

/// Disables the always-on SSH service so only socket activation remains.
///
/// Removes the service's activation links and its alias symlinks.
///
/// # Errors
///
/// Returns an I/O error if a link cannot be removed.
pub fn disable_ssh_service(rootfs: &Path, profile: &DistroProfile) -> Result<()> {
    let mut removed = remove_activation_links(rootfs, profile.ssh_service)?.len();
    let base = confined(rootfs, SYSTEM_UNIT_DIR)?;
    for alias in profile.ssh_aliases {
        let link = base.join(alias);
        if is_symlink(&link) {
            remove_link(&link)?;
            removed += 1;
        }
    }
    tracing::info!(
        service = profile.ssh_service,
        socket = profile.ssh_socket,
        removed,
        "SSH switched to socket activation"
    );
    Ok(())
}

/// Removes activation links for every silenced unit.
///
/// # Errors
///
/// Returns an I/O error if a link cannot be removed.
pub fn silence_units(rootfs: &Path, profile: &DistroProfile) -> Result<()> {
    for unit in profile.silenced_units {
        let removed = remove_activation_links(rootfs, unit)?;
        if !removed.is_empty() {
            tracing::debug!(unit, links = removed.len(), "unit silenced");
        }
    }
    Ok(())
}

/// Renders the preset override for `profile`.
#[must_use]
pub fn preset_contents(profile: &DistroProfile) -> String {
    let mut out = String::from("# Generated by ctforge. Evaluated before vendor presets.\n");
    out.push_str(&format!("enable {}\n", profile.ssh_socket));
    out.push_str(&format!("disable {}\n", profile.ssh_service));
    for unit in profile.silenced_units {
        out.push_str(&format!("disable {unit}\n"));
    }
    out
}

/// Writes [`PRESET_OVERRIDE_FILE`] into the rootfs.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written, and
/// [`ForgeError::PermissionDenied`] if it resolves outside the rootfs.
pub fn write_preset_override(rootfs: &Path, profile: &DistroProfile) -> Result<PathBuf> {
    let path = confined(rootfs, PRESET_OVERRIDE_FILE)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ForgeError::io(parent, e))?;
    }
    std::fs::write(&path, preset_contents(profile)).map_err(|e| ForgeError::io(&path, e))?;
    tracing::debug!(path = %path.display(), "preset override written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::symlink;

    use ctforge_common::distro::Distro;

    use super::*;

    fn link(rootfs: &Path, rel: &str, target: &str) -> PathBuf {
        let path = rootfs.join(rel);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        symlink(target, &path).expect("symlink");
        path
    }

    #[test]
    fn remove_activation_links_covers_all_targets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        let a = link(root, "etc/systemd/system/multi-user.target.wants/cron.service", "/usr/lib/systemd/system/cron.service");
        let b = link(root, "etc/systemd/system/sysinit.target.requires/cron.service", "/usr/lib/systemd/system/cron.service");
        let keep = link(root, "etc/systemd/system/multi-user.target.wants/ssh.socket", "/usr/lib/systemd/system/ssh.socket");

        let removed = remove_activation_links(root, "cron.service").expect("remove");
        assert_eq!(removed.len(), 2);
        assert!(!is_symlink(&a));
        assert!(!is_symlink(&b));
        assert!(is_symlink(&keep));
    }

    #[test]
    fn masks_are_not_activation_links() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mask = link(dir.path(), "etc/systemd/system/cron.service", "/dev/null");
        let removed = remove_activation_links(dir.path(), "cron.service").expect("remove");
        assert!(removed.is_empty());
        assert!(is_symlink(&mask));
    }

    #[test]
    fn missing_unit_dir_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(remove_activation_links(dir.path(), "ssh.service").expect("remove").is_empty());
    }

    #[test]
    fn disable_ssh_service_removes_aliases_and_keeps_socket() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        let wants = link(root, "etc/systemd/system/multi-user.target.wants/ssh.service", "/usr/lib/systemd/system/ssh.service");
        let alias = link(root, "etc/systemd/system/sshd.service", "/usr/lib/systemd/system/ssh.service");
        let socket = link(root, "etc/systemd/system/sockets.target.wants/ssh.socket", "/usr/lib/systemd/system/ssh.socket");

        disable_ssh_service(root, Distro::Ubuntu.profile()).expect("disable");
        assert!(!is_symlink(&wants));
        assert!(!is_symlink(&alias));
        assert!(is_symlink(&socket));

        disable_ssh_service(root, Distro::Ubuntu.profile()).expect("idempotent");
    }

    #[test]
    fn preset_enables_socket_and_disables_the_rest() {
        let profile = Distro::Fedora.profile();
        let preset = preset_contents(profile);
        let lines: Vec<&str> = preset.lines().skip(1).collect();
        assert_eq!(lines[0], "enable sshd.socket");
        assert_eq!(lines[1], "disable sshd.service");
        assert_eq!(lines.len(), 2 + profile.silenced_units.len());
        assert!(lines.contains(&"disable auditd.service"));
    }

    #[test]
    fn write_preset_override_creates_preset_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_preset_override(dir.path(), Distro::Ubuntu.profile()).expect("write");
        assert!(path.ends_with("etc/systemd/system-preset/00-ctforge.preset"));
        assert!(std::fs::read_to_string(path).expect("read").contains("enable ssh.socket\n"));
    }
}
