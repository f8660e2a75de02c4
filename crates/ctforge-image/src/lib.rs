//! # ctforge-image
//!
//! Template archive handling for ctforge.
//!
//! Handles:
//! - **Catalog**: finding the newest base template and fetching it.
//! - **Storage**: primary and target template cache lookup.
//! - **Archive**: `.tar.zst` / `.tar.xz` extraction into the workspace.
//! - **Repack**: packing the customized rootfs with the platform's codec.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod archive;
pub mod catalog;
pub mod repack;
pub mod storage;
