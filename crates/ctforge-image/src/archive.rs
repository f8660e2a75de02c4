//! Base template extraction.
//!
//! Dispatches on the archive suffix and streams the decompressed tar
//! directly into the workspace rootfs.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ctforge_common::error::{ForgeError, Result};
use ctforge_common::types::Compression;

/// Extracts a `.tar.zst` or `.tar.xz` template into `target`.
///
/// Permissions, xattrs and (when running as root) numeric ownership are
/// preserved. Returns the compressed archive size in bytes.
///
/// # Errors
///
/// Returns [`ForgeError::UnsupportedFormat`] for any other suffix, and an
/// I/O error if the archive cannot be read or unpacked.
pub fn extract_template(archive_path: &Path, target: &Path) -> Result<u64> {
    let compression = Compression::from_path(archive_path)?;
    tracing::info!(
        archive = %archive_path.display(),
        target = %target.display(),
        %compression,
        "extracting template"
    );

    std::fs::create_dir_all(target).map_err(|e| ForgeError::io(target, e))?;

    let file = File::open(archive_path).map_err(|e| ForgeError::io(archive_path, e))?;
    let size_bytes = file
        .metadata()
        .map_err(|e| ForgeError::io(archive_path, e))?
        .len();

    match compression {
        Compression::Zstd => {
            let decoder =
                zstd::stream::read::Decoder::new(file).map_err(|e| ForgeError::io(archive_path, e))?;
            unpack(decoder, target)?;
        }
        Compression::Xz => unpack(xz2::read::XzDecoder::new(file), target)?,
    }

    tracing::info!(size = size_bytes, "template extracted");
    Ok(size_bytes)
}

/// Unpacks a tar stream into `target`.
fn unpack<R: Read>(reader: R, target: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_preserve_ownerships(nix::unistd::Uid::effective().is_root());
    archive.set_unpack_xattrs(true);
    archive.set_overwrite(true);
    archive.unpack(target).map_err(|e| ForgeError::io(target, e))
}
