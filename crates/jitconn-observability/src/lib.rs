// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # jitconn-observability
//!
//! Logging setup shared by the jitconn crates and tools, with per-crate
//! debug flag support.
//!
//! ## Features
//! - `file-logging`: timestamped run folders with daily rotation

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known jitconn crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "jitconn",
    "jitconn-connectivity",
    "jitconn-kernels",
    "jitconn-config",
    "jitconn-probe",
];
