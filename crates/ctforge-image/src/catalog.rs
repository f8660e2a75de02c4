//! Platform template catalog lookup.
//!
//! Queries the catalog for base templates of a distribution release, picks
//! the newest by version ordering, and makes sure the archive is present
//! locally.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use ctforge_common::constants::{CATALOG_SECTION, PVE_LOCAL_STORAGE, TEMPLATE_ARCH};
use ctforge_common::distro::DistroProfile;
use ctforge_common::error::{ForgeError, Result};
use ctforge_common::types::Compression;
use ctforge_core::process::{CommandRunner, CommandSpec};

use crate::storage::TemplateStore;

/// The chosen upstream base template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    /// Catalog identifier (the archive file name).
    pub id: String,
    /// Local path of the archive.
    pub path: PathBuf,
    /// Archive codec.
    pub compression: Compression,
}

/// Source of downloadable base templates.
pub trait TemplateCatalog {
    /// Refreshes the catalog index.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails; callers treat this as a warning.
    fn refresh(&self) -> Result<()>;

    /// Lists identifiers of all available system templates.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried.
    fn available(&self) -> Result<Vec<String>>;

    /// Downloads `id` into the primary template cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the download fails.
    fn download(&self, id: &str) -> Result<()>;
}

/// Catalog backed by the `pveam` appliance manager.
pub struct PveamCatalog<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> PveamCatalog<'a> {
    /// Creates a catalog issuing `pveam` commands through `runner`.
    #[must_use]
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }
}

impl TemplateCatalog for PveamCatalog<'_> {
    fn refresh(&self) -> Result<()> {
        let spec = CommandSpec::new("pveam").arg("update").capture();
        let _ = self.runner.execute(&spec)?;
        Ok(())
    }

    fn available(&self) -> Result<Vec<String>> {
        let spec = CommandSpec::new("pveam")
            .args(["available", "--section", CATALOG_SECTION])
            .capture();
        let output = self.runner.execute(&spec)?;
        Ok(parse_available(&output.stdout))
    }

    fn download(&self, id: &str) -> Result<()> {
        tracing::info!(template = id, "downloading base template");
        let spec = CommandSpec::new("pveam").args(["download", PVE_LOCAL_STORAGE, id]);
        let _ = self.runner.execute(&spec)?;
        Ok(())
    }
}

/// Parses `pveam available` output (`<section> <identifier>` per line).
#[must_use]
pub fn parse_available(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(ToString::to_string)
        .collect()
}

/// Whether `id` is an amd64 template archive starting with `prefix`.
#[must_use]
pub fn matches_template(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix).is_some_and(|rest| {
        [Compression::Zstd, Compression::Xz]
            .iter()
            .any(|c| rest.ends_with(&format!("_{TEMPLATE_ARCH}{}", c.suffix())))
    })
}

/// Compares two identifiers treating runs of digits as numbers.
///
/// `_10` sorts after `_2`; otherwise bytes compare as usual.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a.as_bytes(), b.as_bytes());
    loop {
        match (a.first(), b.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let (num_a, rest_a) = split_digits(a);
                let (num_b, rest_b) = split_digits(b);
                let (num_a, num_b) = (trim_zeros(num_a), trim_zeros(num_b));
                let ord = num_a.len().cmp(&num_b.len()).then_with(|| num_a.cmp(num_b));
                if ord != Ordering::Equal {
                    return ord;
                }
                (a, b) = (rest_a, rest_b);
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(y);
                }
                (a, b) = (&a[1..], &b[1..]);
            }
        }
    }
}

fn split_digits(s: &[u8]) -> (&[u8], &[u8]) {
    let len = s.iter().take_while(|c| c.is_ascii_digit()).count();
    s.split_at(len)
}

fn trim_zeros(s: &[u8]) -> &[u8] {
    let zeros = s.iter().take_while(|&&c| c == b'0').count();
    &s[zeros..]
}

/// Picks the highest-versioned identifier matching `prefix`.
#[must_use]
pub fn select_latest<'a>(ids: &'a [String], prefix: &str) -> Option<&'a str> {
    ids.iter()
        .map(String::as_str)
        .filter(|id| matches_template(id, prefix))
        .max_by(|a, b| compare_versions(a, b))
}

/// Resolves the newest base template for `release` and ensures it exists
/// locally.
///
/// Lookup order: primary cache, target cache, fresh download into the
/// primary cache.
///
/// # Errors
///
/// Returns [`ForgeError::NotFound`] if no catalog entry matches or the
/// download leaves no file behind, and propagates catalog query errors.
pub fn locate(
    catalog: &dyn TemplateCatalog,
    store: &TemplateStore,
    profile: &DistroProfile,
    release: &str,
) -> Result<TemplateRef> {
    if let Err(e) = catalog.refresh() {
        tracing::warn!(error = %e, "catalog refresh failed; using cached index");
    }

    let prefix = profile.catalog_prefix(release);
    let ids = catalog.available()?;
    let id = select_latest(&ids, &prefix)
        .ok_or_else(|| ForgeError::NotFound {
            kind: "template",
            id: format!("{prefix}*_{TEMPLATE_ARCH}"),
        })?
        .to_string();
    let compression = Compression::from_path(Path::new(&id))?;
    tracing::info!(template = %id, candidates = ids.len(), "selected base template");

    let path = if let Some(path) = store.find(&id) {
        tracing::info!(path = %path.display(), "using cached template");
        path
    } else {
        catalog.download(&id)?;
        let path = store.primary_path(&id);
        if !path.is_file() {
            return Err(ForgeError::NotFound {
                kind: "downloaded template",
                id: path.display().to_string(),
            });
        }
        path
    };

    Ok(TemplateRef {
        id,
        path,
        compression,
    })
}
