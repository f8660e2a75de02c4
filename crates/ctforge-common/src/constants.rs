//! Platform paths and fixed defaults.

/// Primary template cache managed by `pveam` on the `local` storage.
pub const PVE_TEMPLATE_CACHE: &str = "/var/lib/vz/template/cache";

/// Root under which Proxmox mounts shared storages (`/mnt/pve/<id>`).
pub const PVE_SHARED_STORAGE_ROOT: &str = "/mnt/pve";

/// Template cache path relative to a storage mount point.
pub const STORAGE_TEMPLATE_SUBDIR: &str = "template/cache";

/// Storage identifier `pveam download` writes into.
pub const PVE_LOCAL_STORAGE: &str = "local";

/// Catalog section holding the distribution base templates.
pub const CATALOG_SECTION: &str = "system";

/// Host resolver configuration read for nameserver detection.
pub const HOST_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Public resolver used when the host only offers loopback nameservers.
pub const FALLBACK_NAMESERVER: &str = "1.1.1.1";

/// Runtime directory of `systemd-resolved`, relative to the rootfs.
///
/// Created only for the chroot phase and removed before repacking.
pub const RESOLVED_RUNTIME_DIR: &str = "run/systemd/resolve";

/// Stub resolver file `/etc/resolv.conf` points at in systemd images.
pub const RESOLVED_STUB_FILE: &str = "run/systemd/resolve/stub-resolv.conf";

/// Location of the generated customization script inside the rootfs.
pub const CUSTOMIZE_SCRIPT: &str = "tmp/ctforge-customize.sh";

/// Environment variable carrying the root SSH public key.
pub const AUTH_KEY_ENV: &str = "AUTH_KEY";

/// Default template label embedded in output names.
pub const DEFAULT_TEMPLATE_LABEL: &str = "cloud";

/// Architecture tag used in catalog and output names.
pub const TEMPLATE_ARCH: &str = "amd64";

/// Pseudo-filesystems bind-mounted into the chroot, in mount order.
pub const PSEUDO_FILESYSTEMS: [&str; 3] = ["proc", "sys", "dev"];

/// Prefix of scratch workspace directories.
pub const WORKSPACE_PREFIX: &str = "ctforge-";

/// Preset override file written into the rootfs.
pub const PRESET_OVERRIDE_FILE: &str = "etc/systemd/system-preset/00-ctforge.preset";

/// Application name used in CLI output.
pub const APP_NAME: &str = "ctforge";
