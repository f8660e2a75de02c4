//! The customization stage.
//!
//! Order inside the workspace rootfs:
//! 1. resolver stub written, pseudo-filesystems mounted
//! 2. chroot script: packages, units, SSH key, package caches
//! 3. host-side finishing: SSH activation, network, presets, banner, caches
//! 4. injected files removed, mounts released
//!
//! Step 4 runs whatever happened before it.

use std::path::Path;

use ctforge_common::config::BuildConfig;
use ctforge_common::constants::{AUTH_KEY_ENV, CUSTOMIZE_SCRIPT};
use ctforge_common::error::Result;
use ctforge_common::types::PackageFamily;
use ctforge_core::chroot;
use ctforge_core::filesystem::{MountGuard, Mounter, ScratchWorkspace};
use ctforge_core::interrupt;
use ctforge_core::process::CommandRunner;

use crate::{cleanup, network, script, services};

/// Runs the customization stage against a workspace.
pub struct Customizer<'a> {
    runner: &'a dyn CommandRunner,
    mounter: &'a dyn Mounter,
}

impl<'a> Customizer<'a> {
    /// Creates a customizer using `runner` for the chroot and `mounter`
    /// for pseudo-filesystems.
    #[must_use]
    pub const fn new(runner: &'a dyn CommandRunner, mounter: &'a dyn Mounter) -> Self {
        Self { runner, mounter }
    }

    /// Customizes the rootfs extracted into `workspace`.
    ///
    /// Mounts are released and the script removed even when a step fails;
    /// the first error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ctforge_common::error::ForgeError::NotFound`] if no
    /// supported package manager is present, `CommandFailed` if the chroot
    /// script fails, `Interrupted` on a signal, and I/O errors from
    /// host-side edits or unmounting.
    pub fn run(&self, workspace: &ScratchWorkspace, config: &BuildConfig) -> Result<()> {
        let rootfs = workspace.rootfs();
        let family = PackageFamily::detect(&rootfs)?;
        tracing::info!(distro = %config.distro, release = %config.release, %family, "customizing rootfs");

        cleanup::write_resolver_stub(&rootfs, &config.nameserver)?;
        let mounts = MountGuard::mount_pseudo_filesystems(self.mounter, workspace)?;

        let outcome = self.customize(&rootfs, config, family);
        let removed = cleanup::remove_injected(&rootfs).inspect_err(|e| {
            tracing::error!(error = %e, "failed to remove injected files");
        });
        let released = mounts.release();

        outcome.and(removed).and(released)
    }

    fn customize(&self, rootfs: &Path, config: &BuildConfig, family: PackageFamily) -> Result<()> {
        let profile = config.profile();
        interrupt::check()?;

        let procedure = script::build(profile, family);
        script::install(rootfs, &procedure)?;
        let key = config.ssh_key.as_deref().map_or("", str::trim);
        let command = chroot::script_command(
            rootfs,
            CUSTOMIZE_SCRIPT,
            &[("DEBIAN_FRONTEND", "noninteractive"), (AUTH_KEY_ENV, key)],
        );
        tracing::info!(%family, "running chroot customization");
        let _ = self.runner.execute(&command)?;
        interrupt::check()?;

        services::disable_ssh_service(rootfs, profile)?;
        services::silence_units(rootfs, profile)?;
        let _ = services::write_preset_override(rootfs, profile)?;
        network::apply_network_policy(rootfs, profile)?;
        network::install_login_banner(rootfs, profile)?;
        cleanup::purge_caches(rootfs, profile)?;
        tracing::info!("rootfs customized");
        Ok(())
    }
}
