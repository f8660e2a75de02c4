//! # ctforge-rootfs
//!
//! Customization of an extracted template rootfs.
//!
//! A rendered bash script runs inside the chroot for work that needs the
//! guest's own tools (package manager, `systemctl`, root's SSH key).
//! Unit links, network files and cache purges are edited from the host.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cleanup;
pub mod confine;
pub mod customize;
pub mod network;
pub mod script;
pub mod services;

pub use customize::Customizer;
