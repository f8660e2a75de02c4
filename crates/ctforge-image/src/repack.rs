//! Repacking a customized rootfs into a template archive.
//!
//! GNU `tar` writes the stream (it handles numeric ownership, xattrs and
//! device nodes) and the codec's own CLI compresses it. The archive is
//! written next to the destination and renamed into place.

use std::path::{Path, PathBuf};

use ctforge_common::error::{ForgeError, Result};
use ctforge_common::types::Compression;
use ctforge_core::preflight::find_tool;
use ctforge_core::process::{CommandRunner, CommandSpec};

/// The packed output template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Final archive path.
    pub path: PathBuf,
    /// Codec used.
    pub compression: Compression,
    /// Archive size in bytes.
    pub size_bytes: u64,
}

/// `tar` arguments archiving the contents of `rootfs` (not the directory
/// entry itself) to stdout.
#[must_use]
pub fn tar_args(rootfs: &Path) -> Vec<String> {
    let rootfs = rootfs.to_string_lossy();
    ["--numeric-owner", "--xattrs", "--xattrs-include=*", "-C", &*rootfs, "-cf", "-", "."]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Temporary sibling path the archive is streamed into.
#[must_use]
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Archives `rootfs` into `dest` with `compression`, replacing any existing
/// file.
///
/// # Errors
///
/// Returns [`ForgeError::ToolMissing`] if `tar` or the compressor is not
/// installed, [`ForgeError::CommandFailed`] if either exits unsuccessfully,
/// and I/O errors for the output file.
pub fn repack(
    runner: &dyn CommandRunner,
    rootfs: &Path,
    dest: &Path,
    compression: Compression,
) -> Result<Artifact> {
    let tar = find_tool("tar", "tar")?;
    let compressor = find_tool(compression.tool(), compression.package())?;
    let producer = CommandSpec::new(tar.to_string_lossy()).args(tar_args(rootfs));
    let consumer = CommandSpec::new(compressor.to_string_lossy())
        .args(compression.compressor_args().iter().copied());
    let partial = partial_path(dest);
    tracing::info!(
        rootfs = %rootfs.display(),
        dest = %dest.display(),
        %compression,
        "repacking rootfs"
    );

    if let Err(e) = runner.execute_pipe(&producer, &consumer, &partial) {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }

    std::fs::rename(&partial, dest).map_err(|e| ForgeError::io(dest, e))?;
    let size_bytes = std::fs::metadata(dest)
        .map_err(|e| ForgeError::io(dest, e))?
        .len();
    tracing::info!(path = %dest.display(), size = size_bytes, "template packed");

    Ok(Artifact {
        path: dest.to_path_buf(),
        compression,
        size_bytes,
    })
}
