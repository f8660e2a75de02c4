//! Formatted output helpers for the build report.
//!
//! Human-readable sizes and the storage volume id the platform expects in
//! `pct create`.

use std::path::{Component, Path};

use ctforge_common::constants::{
    PVE_LOCAL_STORAGE, PVE_SHARED_STORAGE_ROOT, PVE_TEMPLATE_CACHE, STORAGE_TEMPLATE_SUBDIR,
};
use ctforge_image::repack::Artifact;

/// Formats a byte count into a human-readable string (e.g., "128 MiB").
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Storage id owning `cache_dir`: `local` for the local template cache,
/// `<id>` for `/mnt/pve/<id>/template/cache`, otherwise `None`.
#[must_use]
pub fn storage_id_for(cache_dir: &Path) -> Option<String> {
    if cache_dir == Path::new(PVE_TEMPLATE_CACHE) {
        return Some(PVE_LOCAL_STORAGE.to_string());
    }
    let rest = cache_dir.strip_prefix(PVE_SHARED_STORAGE_ROOT).ok()?;
    let mut components = rest.components();
    let Some(Component::Normal(id)) = components.next() else {
        return None;
    };
    (components.as_path() == Path::new(STORAGE_TEMPLATE_SUBDIR))
        .then(|| id.to_string_lossy().into_owned())
}

/// Template reference for `pct create`: `<storage>:vztmpl/<file>` when the
/// storage is known, otherwise the artifact path.
#[must_use]
pub fn template_volume(cache_dir: &Path, artifact_path: &Path) -> String {
    let file = artifact_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    match (storage_id_for(cache_dir), file) {
        (Some(storage), Some(file)) => format!("{storage}:vztmpl/{file}"),
        _ => artifact_path.display().to_string(),
    }
}

/// Example container creation command for the new template.
#[must_use]
pub fn sample_invocation(volume: &str) -> String {
    format!(
        "pct create <vmid> {volume} --hostname <name> --unprivileged 1 \
         --net0 name=eth0,bridge=vmbr0,ip=dhcp --storage local-lvm"
    )
}

/// Prints the final build report to stdout.
#[allow(clippy::print_stdout)]
pub fn print_report(artifact: &Artifact, cache_dir: &Path) {
    let volume = template_volume(cache_dir, &artifact.path);
    println!("Template: {}", artifact.path.display());
    println!("Size:     {}", format_bytes(artifact.size_bytes));
    println!();
    println!("Create a container with:");
    println!("  {}", sample_invocation(&volume));
}
