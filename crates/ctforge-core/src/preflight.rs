//! Host checks run before any workspace is created.

use std::path::PathBuf;

use ctforge_common::error::{ForgeError, Result};

/// Host tools every build needs, as (command, package).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("pveam", "pve-manager"),
    ("chroot", "coreutils"),
    ("tar", "tar"),
];

/// Locates `tool` on `PATH`.
///
/// # Errors
///
/// Returns [`ForgeError::ToolMissing`] naming `package` if not found.
pub fn find_tool(tool: &str, package: &str) -> Result<PathBuf> {
    which::which(tool).map_err(|_| ForgeError::ToolMissing {
        tool: tool.to_string(),
        package: package.to_string(),
    })
}

/// Checks that every (command, package) pair is available.
///
/// # Errors
///
/// Returns [`ForgeError::ToolMissing`] for the first missing tool.
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    for (tool, package) in tools {
        let path = find_tool(tool, package)?;
        tracing::debug!(tool, path = %path.display(), "found host tool");
    }
    Ok(())
}

/// Ensures the process runs with an effective UID of 0.
///
/// Bind mounts and `chroot(2)` need it.
///
/// # Errors
///
/// Returns [`ForgeError::PermissionDenied`] for unprivileged users.
pub fn require_root() -> Result<()> {
    if nix::unistd::Uid::effective().is_root() {
        Ok(())
    } else {
        Err(ForgeError::PermissionDenied {
            message: "building templates requires root (mounts and chroot)".into(),
        })
    }
}
