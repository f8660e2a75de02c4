//! Filesystem management for the build workspace.
//!
//! Provides the scratch workspace and the pseudo-filesystem bind mounts
//! needed to run package managers inside a chroot.

pub mod mount;
pub mod workspace;

pub use mount::{MountGuard, Mounter, SystemMounter};
pub use workspace::ScratchWorkspace;
