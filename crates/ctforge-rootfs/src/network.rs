//! Network configuration and the console login banner.

use std::path::{Path, PathBuf};

use ctforge_common::distro::{DistroProfile, NetworkPolicy};
use ctforge_common::error::{ForgeError, Result};

use crate::confine::confined;

/// systemd-networkd configuration directory relative to the rootfs.
pub const NETWORK_DIR: &str = "etc/systemd/network";

/// File name of the generated DHCP configuration.
pub const DHCP_FILE: &str = "eth0.network";

/// Generated DHCP configuration for the container's first interface.
pub const DHCP_CONFIG: &str = "[Match]\nName=eth0\n\n[Network]\nDHCP=yes\n";

/// Console banner showing the distribution and the container's addresses.
pub const LOGIN_BANNER: &str = "\\S \\n \\l\n\n  IPv4: \\4\n  IPv6: \\6\n\n";

/// Whether any `*.network` file already exists in [`NETWORK_DIR`].
#[must_use]
pub fn has_network_config(rootfs: &Path) -> bool {
    std::fs::read_dir(rootfs.join(NETWORK_DIR)).is_ok_and(|entries| {
        entries
            .filter_map(std::result::Result::ok)
            .any(|e| e.path().extension().is_some_and(|ext| ext == "network"))
    })
}

/// Writes [`DHCP_CONFIG`] unless the rootfs already has network config.
/// Returns the path of the file written.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written, and
/// [`ForgeError::PermissionDenied`] if it resolves outside the rootfs.
pub fn write_dhcp_config(rootfs: &Path) -> Result<Option<PathBuf>> {
    if has_network_config(rootfs) {
        tracing::debug!("existing network configuration kept");
        return Ok(None);
    }
    let dir = confined(rootfs, NETWORK_DIR)?;
    std::fs::create_dir_all(&dir).map_err(|e| ForgeError::io(&dir, e))?;
    let path = confined(rootfs, Path::new(NETWORK_DIR).join(DHCP_FILE))?;
    std::fs::write(&path, DHCP_CONFIG).map_err(|e| ForgeError::io(&path, e))?;
    Ok(Some(path))
}

/// Applies the profile's [`NetworkPolicy`].
///
/// With [`NetworkPolicy::PlatformManaged`] the file generated here is
/// removed again because the platform writes its own interface config at
/// container start; pre-existing files are never touched.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written or removed.
pub fn apply_network_policy(rootfs: &Path, profile: &DistroProfile) -> Result<()> {
    let Some(path) = write_dhcp_config(rootfs)? else {
        return Ok(());
    };
    match profile.network {
        NetworkPolicy::Dhcp => {
            tracing::info!(path = %path.display(), "DHCP network configuration written");
        }
        NetworkPolicy::PlatformManaged => {
            std::fs::remove_file(&path).map_err(|e| ForgeError::io(&path, e))?;
            tracing::info!("network configuration left to the platform");
        }
    }
    Ok(())
}

/// Writes `etc/issue` when the profile asks for a login banner.
///
/// # Errors
///
/// Returns an I/O error if the banner cannot be written, and
/// [`ForgeError::PermissionDenied`] if it resolves outside the rootfs.
pub fn install_login_banner(rootfs: &Path, profile: &DistroProfile) -> Result<()> {
    if !profile.login_banner {
        return Ok(());
    }
    let path = confined(rootfs, "etc/issue")?;
    std::fs::write(&path, LOGIN_BANNER).map_err(|e| ForgeError::io(&path, e))?;
    tracing::debug!(path = %path.display(), "login banner written");
    Ok(())
}
