//! # ctforge-core
//!
//! Host-side primitives for building container templates.
//!
//! This crate provides safe wrappers over:
//! - **Processes**: a [`process::CommandRunner`] abstraction with typed
//!   failure tolerance.
//! - **Filesystem**: scratch workspaces and `/proc`, `/sys`, `/dev` bind
//!   mounts released on every exit path.
//! - **Chroot**: command construction for running scripts inside a rootfs.
//! - **Host state**: nameserver detection, preflight checks, and signal
//!   handling.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod chroot;
pub mod filesystem;
pub mod interrupt;
pub mod nameserver;
pub mod preflight;
pub mod process;
