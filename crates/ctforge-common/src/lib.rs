//! # ctforge-common
//!
//! Shared types, error definitions, build configuration, distro profiles,
//! and platform constants used across the ctforge workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod distro;
pub mod error;
pub mod types;
