//! Unified error types for the ctforge workspace.
//!
//! Every library crate returns [`Result`]; the CLI wraps these in `anyhow`
//! with additional context at the binary edge.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// The base archive uses a compression format we cannot unpack.
    #[error("unsupported archive format: {path}")]
    UnsupportedFormat {
        /// Archive whose suffix was not recognised.
        path: PathBuf,
    },

    /// A host tool required by the pipeline is not on `PATH`.
    #[error("required tool `{tool}` not found (install: {package})")]
    ToolMissing {
        /// Executable name.
        tool: String,
        /// Host package that provides it.
        package: String,
    },

    /// An external command exited unsuccessfully.
    #[error("command `{command}` failed: {status}")]
    CommandFailed {
        /// Rendered command line.
        command: String,
        /// Exit status description.
        status: String,
    },

    /// A permission or privilege error.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Description of the denied operation.
        message: String,
    },

    /// The operator interrupted the build.
    #[error("build interrupted")]
    Interrupted,
}

impl ForgeError {
    /// Builds a [`ForgeError::Io`] for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ForgeError>;
