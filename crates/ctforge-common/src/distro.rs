//! Per-distribution build profiles.
//!
//! Each variant pins its catalog naming pattern, output codec, package set,
//! and the systemd units it enables or silences inside the container.

use std::fmt;

use crate::types::Compression;

/// How the image's network configuration is left for the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkPolicy {
    /// Keep a generated DHCP `systemd-networkd` config.
    Dhcp,
    /// Generate the DHCP config, then drop it again: the platform writes a
    /// static config at container start and a leftover file would conflict.
    PlatformManaged,
}

/// Static description of one distribution variant.
#[derive(Debug)]
pub struct DistroProfile {
    /// Identifier used in catalog and output names.
    pub id: &'static str,
    /// Catalog flavor following the release (`standard`, `default`).
    pub catalog_flavor: &'static str,
    /// Release used when `--release` is not given.
    pub default_release: &'static str,
    /// Codec the platform expects for this distribution's templates.
    pub compression: Compression,
    /// Packages installed on top of the base template.
    pub packages: &'static [&'static str],
    /// Units enabled after package installation.
    pub enable_units: &'static [&'static str],
    /// Socket unit starting SSH on the first connection.
    pub ssh_socket: &'static str,
    /// Always-on SSH service unit.
    pub ssh_service: &'static str,
    /// Alias unit names that point at the SSH service.
    pub ssh_aliases: &'static [&'static str],
    /// Units disabled and masked inside the container.
    pub silenced_units: &'static [&'static str],
    /// Network configuration handling.
    pub network: NetworkPolicy,
    /// Whether to install an `/etc/issue` banner with the container addresses.
    pub login_banner: bool,
    /// Package-manager cache directories emptied before repacking.
    pub cache_dirs: &'static [&'static str],
}

impl DistroProfile {
    /// Catalog identifier prefix for the given release.
    ///
    /// ```
    /// use ctforge_common::distro::Distro;
    /// let prefix = Distro::Ubuntu.profile().catalog_prefix("24.04");
    /// assert_eq!(prefix, "ubuntu-24.04-standard_");
    /// ```
    #[must_use]
    pub fn catalog_prefix(&self, release: &str) -> String {
        format!("{}-{release}-{}_", self.id, self.catalog_flavor)
    }
}

/// Supported distribution variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distro {
    /// Ubuntu LTS, apt based, zstd templates.
    Ubuntu,
    /// Fedora, dnf based, xz templates.
    Fedora,
}

impl Distro {
    /// Returns the static profile of this variant.
    #[must_use]
    pub const fn profile(self) -> &'static DistroProfile {
        match self {
            Self::Ubuntu => &UBUNTU,
            Self::Fedora => &FEDORA,
        }
    }
}

impl fmt::Display for Distro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().id)
    }
}

static UBUNTU: DistroProfile = DistroProfile {
    id: "ubuntu",
    catalog_flavor: "standard",
    default_release: "24.04",
    compression: Compression::Zstd,
    packages: &[
        "iproute2",
        "iputils-ping",
        "procps",
        "psmisc",
        "sssd",
        "libnss-sss",
        "libpam-sss",
        "openssh-server",
        "vim",
        "less",
        "curl",
        "htop",
        "dnsutils",
    ],
    enable_units: &["systemd-networkd.service"],
    ssh_socket: "ssh.socket",
    ssh_service: "ssh.service",
    ssh_aliases: &["sshd.service"],
    silenced_units: &[
        "systemd-udevd.service",
        "systemd-udevd-control.socket",
        "systemd-udevd-kernel.socket",
        "systemd-resolved.service",
        "apparmor.service",
        "postfix.service",
        "cron.service",
        "rsyslog.service",
    ],
    network: NetworkPolicy::PlatformManaged,
    login_banner: true,
    cache_dirs: &["var/cache/apt/archives", "var/lib/apt/lists"],
};

static FEDORA: DistroProfile = DistroProfile {
    id: "fedora",
    catalog_flavor: "default",
    default_release: "42",
    compression: Compression::Xz,
    packages: &[
        "systemd",
        "systemd-networkd",
        "chrony",
        "sssd-client",
        "openldap-clients",
        "openssh-server",
        "procps-ng",
        "iproute",
    ],
    enable_units: &["systemd-networkd.service", "chronyd.service"],
    ssh_socket: "sshd.socket",
    ssh_service: "sshd.service",
    ssh_aliases: &[],
    silenced_units: &[
        "systemd-udevd.service",
        "systemd-udevd-control.socket",
        "systemd-udevd-kernel.socket",
        "systemd-resolved.service",
        "systemd-homed.service",
        "auditd.service",
        "crond.service",
        "rsyslog.service",
    ],
    network: NetworkPolicy::Dhcp,
    login_banner: false,
    cache_dirs: &["var/cache/dnf"],
};
