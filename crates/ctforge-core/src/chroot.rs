//! Command execution inside an extracted rootfs via `chroot(8)`.

use std::path::Path;

use crate::process::CommandSpec;

/// `PATH` given to commands inside the chroot.
pub const CHROOT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Builds the command running `script` (relative to the rootfs) with bash
/// inside `rootfs`.
///
/// The host environment is not inherited; only a minimal locale and `PATH`
/// plus `env` reach the script.
#[must_use]
pub fn script_command(rootfs: &Path, script: &str, env: &[(&str, &str)]) -> CommandSpec {
    let script = format!("/{}", script.trim_start_matches('/'));
    let mut spec = CommandSpec::new("chroot")
        .arg(rootfs.display().to_string())
        .args(["/bin/bash", script.as_str()])
        .clear_env()
        .env("PATH", CHROOT_PATH)
        .env("HOME", "/root")
        .env("LANG", "C.UTF-8")
        .env("TERM", "dumb");
    for (key, value) in env {
        spec = spec.env(*key, *value);
    }
    spec
}
