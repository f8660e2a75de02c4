//! Resolved build configuration.
//!
//! A [`BuildConfig`] is assembled once from defaults and command-line
//! overrides, then handed by reference to every pipeline stage.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::constants::{STORAGE_TEMPLATE_SUBDIR, TEMPLATE_ARCH};
use crate::distro::{Distro, DistroProfile};
use crate::error::{ForgeError, Result};

/// Fully resolved options for one build run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Distribution variant being built.
    pub distro: Distro,
    /// Target distribution release.
    pub release: String,
    /// Template label embedded in the default output name.
    pub template_label: String,
    /// Output archive file name, suffix already normalized.
    pub output_name: String,
    /// Public key appended to root's `authorized_keys`.
    pub ssh_key: Option<String>,
    /// Nameserver written into the chroot for package downloads.
    pub nameserver: String,
    /// Directory receiving the finished archive.
    pub cache_dir: PathBuf,
}

impl BuildConfig {
    /// Static profile of the configured distribution.
    #[must_use]
    pub const fn profile(&self) -> &'static DistroProfile {
        self.distro.profile()
    }

    /// Full destination path of the output archive.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.cache_dir.join(&self.output_name)
    }
}

/// Default output name: `{distro}-{release}-{label}_{YYYYMMDD}_amd64.{ext}`.
#[must_use]
pub fn default_output_name(
    profile: &DistroProfile,
    release: &str,
    label: &str,
    today: NaiveDate,
) -> String {
    format!(
        "{}-{release}-{label}_{}_{TEMPLATE_ARCH}{}",
        profile.id,
        today.format("%Y%m%d"),
        profile.compression.suffix()
    )
}

/// Resolves the output file name, normalizing a user-supplied suffix.
///
/// # Errors
///
/// Returns [`ForgeError::Config`] if the explicit name is empty, contains a
/// path separator, or is a relative directory reference.
pub fn resolve_output_name(
    profile: &DistroProfile,
    release: &str,
    label: &str,
    explicit: Option<&str>,
    today: NaiveDate,
) -> Result<String> {
    let Some(name) = explicit else {
        return Ok(default_output_name(profile, release, label, today));
    };
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(ForgeError::Config {
            message: format!("output must be a plain file name, got '{name}'"),
        });
    }
    let normalized = profile.compression.normalize_file_name(name);
    if normalized != name {
        tracing::info!(from = name, to = %normalized, "normalized output suffix");
    }
    Ok(normalized)
}

/// Returns the first `<root>/<storage>/template/cache` directory, sorted by
/// storage name.
#[must_use]
pub fn find_shared_cache(shared_root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(shared_root).ok()?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path().join(STORAGE_TEMPLATE_SUBDIR))
        .filter(|path| path.is_dir())
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Resolves the artifact destination directory.
///
/// An explicit directory is used as given. Otherwise shared storage under
/// `shared_root` is searched before falling back to `default_dir`.
///
/// # Errors
///
/// Returns [`ForgeError::Config`] if the resolved directory does not exist.
pub fn resolve_cache_dir(
    explicit: Option<&Path>,
    shared_root: &Path,
    default_dir: &Path,
) -> Result<PathBuf> {
    let dir = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => find_shared_cache(shared_root).unwrap_or_else(|| default_dir.to_path_buf()),
    };
    if !dir.is_dir() {
        return Err(ForgeError::Config {
            message: format!("target directory does not exist: {}", dir.display()),
        });
    }
    tracing::debug!(dir = %dir.display(), "resolved cache directory");
    Ok(dir)
}
