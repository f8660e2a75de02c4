//! Local template caches.
//!
//! A base template may already sit in the platform's primary cache (where
//! `pveam download` writes) or in the directory we are building into.
//! Checking both avoids downloading the same archive twice.

use std::path::{Path, PathBuf};

/// Lookup over the primary and target template caches.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    primary: PathBuf,
    target: PathBuf,
}

impl TemplateStore {
    /// Opens a store over the primary cache and the build's target cache.
    #[must_use]
    pub fn open(primary: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        let store = Self {
            primary: primary.into(),
            target: target.into(),
        };
        tracing::debug!(
            primary = %store.primary.display(),
            target = %store.target.display(),
            "opened template store"
        );
        store
    }

    /// Where `pveam download` places the template `id`.
    #[must_use]
    pub fn primary_path(&self, id: &str) -> PathBuf {
        self.primary.join(id)
    }

    /// Finds `id` in the primary cache first, then in the target cache.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<PathBuf> {
        [&self.primary, &self.target]
            .into_iter()
            .map(|dir| dir.join(id))
            .find(|path| path.is_file())
    }

    /// Primary cache directory.
    #[must_use]
    pub fn primary(&self) -> &Path {
        &self.primary
    }
}
