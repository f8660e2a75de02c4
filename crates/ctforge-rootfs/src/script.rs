//! The customization script executed inside the chroot.
//!
//! Built from typed [`CommandSpec`]s so tolerance is decided per command;
//! rendering turns tolerated commands into `cmd || true` under
//! `set -euo pipefail`.

use std::fmt::Write as _;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use ctforge_common::constants::{AUTH_KEY_ENV, CUSTOMIZE_SCRIPT, RESOLVED_STUB_FILE};
use ctforge_common::distro::DistroProfile;
use ctforge_common::error::{ForgeError, Result};
use ctforge_common::types::PackageFamily;
use ctforge_core::process::{CommandSpec, Tolerance};

use crate::confine::confined;

/// One line of the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLine {
    /// `# text`
    Comment(String),
    /// A quoted command.
    Command(CommandSpec),
    /// Shell source emitted verbatim.
    Raw(String),
}

/// An ordered, strict-mode bash script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChrootScript {
    lines: Vec<ScriptLine>,
}

impl ChrootScript {
    /// Adds a section comment.
    pub fn comment(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(ScriptLine::Comment(text.into()));
        self
    }

    /// Adds a command.
    pub fn command(&mut self, spec: CommandSpec) -> &mut Self {
        self.lines.push(ScriptLine::Command(spec));
        self
    }

    /// Adds raw shell source.
    pub fn raw(&mut self, source: impl Into<String>) -> &mut Self {
        self.lines.push(ScriptLine::Raw(source.into()));
        self
    }

    /// Script lines in order.
    #[must_use]
    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }

    /// Renders the script as bash source.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("#!/bin/bash\nset -euo pipefail\n");
        for line in &self.lines {
            match line {
                ScriptLine::Comment(text) => {
                    let _ = write!(out, "\n# {text}\n");
                }
                ScriptLine::Raw(source) => {
                    out.push_str(source);
                    out.push('\n');
                }
                ScriptLine::Command(spec) => {
                    out.push_str(&render_command(spec));
                    out.push('\n');
                }
            }
        }
        out
    }
}

/// Renders a command with its environment prefix and tolerance suffix.
#[must_use]
pub fn render_command(spec: &CommandSpec) -> String {
    let mut words: Vec<String> = spec
        .env
        .iter()
        .map(|(key, value)| format!("{key}={}", shell_quote(value)))
        .collect();
    words.push(shell_quote(&spec.program));
    words.extend(spec.args.iter().map(|arg| shell_quote(arg)));
    let line = words.join(" ");
    match spec.tolerance {
        Tolerance::Fatal => line,
        Tolerance::Tolerated => format!("{line} || true"),
    }
}

/// Quotes `word` for bash when it contains anything beyond a safe set.
#[must_use]
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@+,%".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Shell block appending `$AUTH_KEY` to `{home}/.ssh/authorized_keys`
/// unless an identical line is already there. Does nothing when the
/// variable is empty.
#[must_use]
pub fn authorized_key_block(home: &str) -> String {
    let dir = shell_quote(&format!("{home}/.ssh"));
    let keys = shell_quote(&format!("{home}/.ssh/authorized_keys"));
    format!(
        r#"if [ -n "${{{AUTH_KEY_ENV}:-}}" ]; then
  install -d -m 0700 {dir}
  touch {keys}
  chmod 0600 {keys}
  if ! grep -qxF -- "${AUTH_KEY_ENV}" {keys}; then
    if [ -s {keys} ] && [ -n "$(tail -c 1 {keys})" ]; then echo >> {keys}; fi
    printf '%s\n' "${AUTH_KEY_ENV}" >> {keys}
  fi
fi"#
    )
}

fn systemctl(verb: &str, unit: &str) -> CommandSpec {
    CommandSpec::new("systemctl").args([verb, unit])
}

/// Builds the in-chroot procedure for `profile` using the detected package
/// family.
#[must_use]
pub fn build(profile: &DistroProfile, family: PackageFamily) -> ChrootScript {
    let mut script = ChrootScript::default();
    let stub = format!("/{RESOLVED_STUB_FILE}");

    script.comment("resolver").raw(format!(
        "if ! cmp -s {stub} /etc/resolv.conf; then cp --remove-destination {stub} /etc/resolv.conf; fi"
    ));

    script.comment("packages");
    match family {
        PackageFamily::Apt => {
            script
                .command(CommandSpec::new("apt-get").arg("update"))
                .command(CommandSpec::new("apt-get").args([
                    "-y",
                    "-o",
                    "Dpkg::Options::=--force-confdef",
                    "-o",
                    "Dpkg::Options::=--force-confold",
                    "dist-upgrade",
                ]))
                .command(
                    CommandSpec::new("apt-get")
                        .args(["-y", "install", "--no-install-recommends"])
                        .args(profile.packages.iter().copied()),
                );
        }
        PackageFamily::Dnf => {
            script
                .command(CommandSpec::new("dnf").args(["-y", "makecache", "--refresh"]))
                .command(CommandSpec::new("dnf").args(["-y", "upgrade"]))
                .command(
                    CommandSpec::new("dnf")
                        .args(["-y", "install", "--setopt=install_weak_deps=False"])
                        .args(profile.packages.iter().copied()),
                );
        }
    }

    script.comment("units");
    for unit in profile.enable_units {
        script.command(systemctl("enable", unit));
    }
    script
        .command(systemctl("enable", profile.ssh_socket))
        .command(systemctl("disable", profile.ssh_service).tolerated());
    for unit in profile.silenced_units {
        script
            .command(systemctl("disable", unit).tolerated())
            .command(systemctl("mask", unit).tolerated());
    }

    script.comment("root ssh key").raw(authorized_key_block("/root"));

    script.comment("package caches");
    match family {
        PackageFamily::Apt => {
            script
                .command(CommandSpec::new("apt-get").args(["-y", "autoremove", "--purge"]))
                .command(CommandSpec::new("apt-get").arg("clean"));
        }
        PackageFamily::Dnf => {
            script.command(CommandSpec::new("dnf").args(["clean", "all"]));
        }
    }

    script
}

/// Writes the rendered script into the rootfs at [`CUSTOMIZE_SCRIPT`].
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written or made executable,
/// and [`ForgeError::PermissionDenied`] if it resolves outside the rootfs.
pub fn install(rootfs: &Path, script: &ChrootScript) -> Result<()> {
    let path = confined(rootfs, CUSTOMIZE_SCRIPT)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ForgeError::io(parent, e))?;
    }
    std::fs::write(&path, script.render()).map_err(|e| ForgeError::io(&path, e))?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| ForgeError::io(&path, e))?;
    tracing::debug!(path = %path.display(), lines = script.lines().len(), "installed customization script");
    Ok(())
}

#[cfg(test)]
mod tests {
    use ctforge_common::distro::Distro;

    use super::*;

    #[test]
    fn shell_quote_leaves_safe_words() {
        assert_eq!(shell_quote("openssh-server"), "openssh-server");
        assert_eq!(
            shell_quote("Dpkg::Options::=--force-confold"),
            "Dpkg::Options::=--force-confold"
        );
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
    }

    #[test]
    fn tolerated_commands_render_with_true_fallback() {
        let spec = systemctl("mask", "cron.service").tolerated();
        assert_eq!(render_command(&spec), "systemctl mask cron.service || true");
    }

    #[test]
    fn env_renders_as_prefix() {
        let spec = CommandSpec::new("apt-get")
            .arg("update")
            .env("DEBIAN_FRONTEND", "noninteractive");
        assert_eq!(
            render_command(&spec),
            "DEBIAN_FRONTEND=noninteractive apt-get update"
        );
    }

    #[test]
    fn rendered_script_is_strict() {
        let script = build(Distro::Fedora.profile(), PackageFamily::Dnf).render();
        assert!(script.starts_with("#!/bin/bash\nset -euo pipefail\n"));
    }

    #[test]
    fn apt_script_installs_profile_packages() {
        let profile = Distro::Ubuntu.profile();
        let script = build(profile, PackageFamily::Apt).render();
        assert!(script.contains("apt-get update\n"));
        assert!(script.contains("apt-get -y install --no-install-recommends iproute2"));
        assert!(script.contains("openssh-server"));
        assert!(script.contains("apt-get clean\n"));
        assert!(!script.contains("dnf"));
    }

    #[test]
    fn dnf_script_masks_silenced_units_tolerantly() {
        let profile = Distro::Fedora.profile();
        let script = build(profile, PackageFamily::Dnf).render();
        for unit in profile.silenced_units {
            assert!(script.contains(&format!("systemctl disable {unit} || true")));
            assert!(script.contains(&format!("systemctl mask {unit} || true")));
        }
        assert!(script.contains("systemctl enable sshd.socket\n"));
        assert!(script.contains("systemctl disable sshd.service || true"));
        assert!(script.contains("systemctl enable chronyd.service\n"));
    }

    #[test]
    fn resolver_copy_is_conditional() {
        let script = build(Distro::Ubuntu.profile(), PackageFamily::Apt).render();
        assert!(script.contains(
            "if ! cmp -s /run/systemd/resolve/stub-resolv.conf /etc/resolv.conf; then"
        ));
    }

    fn run_key_block(home: &Path, key: &str) {
        let status = std::process::Command::new("bash")
            .args(["-euo", "pipefail", "-c"])
            .arg(authorized_key_block(&home.display().to_string()))
            .env(AUTH_KEY_ENV, key)
            .status()
            .expect("spawn bash");
        assert!(status.success());
    }

    #[test]
    fn key_block_appends_once_with_private_modes() {
        if which_bash().is_none() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let key = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5 admin@host";
        run_key_block(dir.path(), key);
        run_key_block(dir.path(), key);

        let keys = dir.path().join(".ssh/authorized_keys");
        assert_eq!(std::fs::read_to_string(&keys).expect("read"), format!("{key}\n"));
        let mode = |p: &Path| std::fs::metadata(p).expect("stat").permissions().mode() & 0o777;
        assert_eq!(mode(&keys), 0o600);
        assert_eq!(mode(&dir.path().join(".ssh")), 0o700);
    }

    #[test]
    fn key_block_terminates_existing_last_line() {
        if which_bash().is_none() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(".ssh")).expect("mkdir");
        std::fs::write(dir.path().join(".ssh/authorized_keys"), "ssh-rsa AAAAB3 other").expect("seed");
        run_key_block(dir.path(), "ssh-ed25519 AAAA new");

        let content = std::fs::read_to_string(dir.path().join(".ssh/authorized_keys")).expect("read");
        assert_eq!(content, "ssh-rsa AAAAB3 other\nssh-ed25519 AAAA new\n");
    }

    #[test]
    fn key_block_is_noop_without_key() {
        if which_bash().is_none() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        run_key_block(dir.path(), "");
        assert!(!dir.path().join(".ssh").exists());
    }

    fn which_bash() -> Option<()> {
        std::process::Command::new("bash")
            .arg("-c")
            .arg("true")
            .status()
            .ok()
            .filter(std::process::ExitStatus::success)
            .map(|_| ())
    }

    #[test]
    fn install_writes_executable_script() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = build(Distro::Ubuntu.profile(), PackageFamily::Apt);
        install(dir.path(), &script).expect("install");
        let path = dir.path().join(CUSTOMIZE_SCRIPT);
        let mode = std::fs::metadata(&path).expect("stat").permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(std::fs::read_to_string(&path).expect("read"), script.render());
    }
}
