//! Domain primitive types used across the ctforge workspace.

use std::fmt;
use std::path::Path;

use crate::error::{ForgeError, Result};

/// Archive suffixes recognised when normalizing user-supplied output names.
const KNOWN_ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.zst", ".tar.xz", ".tar.gz", ".tzst", ".txz", ".tgz", ".tar",
];

/// Compression codec of a template archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Zstandard, `.tar.zst`.
    Zstd,
    /// XZ/LZMA2, `.tar.xz`.
    Xz,
}

impl Compression {
    /// Detects the codec from an archive file name.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::UnsupportedFormat`] for anything other than
    /// `.tar.zst` or `.tar.xz`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if name.ends_with(Self::Zstd.suffix()) {
            Ok(Self::Zstd)
        } else if name.ends_with(Self::Xz.suffix()) {
            Ok(Self::Xz)
        } else {
            Err(ForgeError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    }

    /// File suffix including the `.tar` part.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Zstd => ".tar.zst",
            Self::Xz => ".tar.xz",
        }
    }

    /// Compressor executable used when repacking.
    #[must_use]
    pub const fn tool(self) -> &'static str {
        match self {
            Self::Zstd => "zstd",
            Self::Xz => "xz",
        }
    }

    /// Host package providing [`Self::tool`].
    #[must_use]
    pub const fn package(self) -> &'static str {
        match self {
            Self::Zstd => "zstd",
            Self::Xz => "xz-utils",
        }
    }

    /// Compressor arguments writing the compressed stream to stdout.
    ///
    /// Zstd runs multi-threaded near its maximum level; xz uses its
    /// single-threaded extreme preset.
    #[must_use]
    pub const fn compressor_args(self) -> &'static [&'static str] {
        match self {
            Self::Zstd => &["-19", "-T0", "-q", "-c"],
            Self::Xz => &["-9e", "-c"],
        }
    }

    /// Replaces any known archive suffix of `name` with this codec's suffix.
    ///
    /// `foo.tar.xz` becomes `foo.tar.zst` for [`Compression::Zstd`]; a name
    /// without an archive suffix gets one appended.
    #[must_use]
    pub fn normalize_file_name(self, name: &str) -> String {
        let stem = KNOWN_ARCHIVE_SUFFIXES
            .iter()
            .find_map(|suffix| name.strip_suffix(suffix))
            .unwrap_or(name);
        format!("{stem}{}", self.suffix())
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zstd => write!(f, "zstd"),
            Self::Xz => write!(f, "xz"),
        }
    }
}

/// Package manager family found inside a rootfs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageFamily {
    /// Debian/Ubuntu `apt-get`.
    Apt,
    /// Fedora/RHEL `dnf`.
    Dnf,
}

impl PackageFamily {
    /// Detects the package manager present in `rootfs`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::NotFound`] when neither `apt-get` nor `dnf`
    /// exists in the tree.
    pub fn detect(rootfs: &Path) -> Result<Self> {
        let has = |tool: &str| {
            ["usr/bin", "bin"]
                .iter()
                .any(|dir| rootfs.join(dir).join(tool).exists())
        };
        if has("apt-get") {
            Ok(Self::Apt)
        } else if has("dnf") {
            Ok(Self::Dnf)
        } else {
            Err(ForgeError::NotFound {
                kind: "package manager",
                id: rootfs.display().to_string(),
            })
        }
    }
}

impl fmt::Display for PackageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apt => write!(f, "apt"),
            Self::Dnf => write!(f, "dnf"),
        }
    }
}
