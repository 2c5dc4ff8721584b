// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to one section of `jitconn.toml`. Missing sections and
//! fields fall back to their `Default`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct JitconnConfig {
    pub kernel: KernelConfig,
    pub backend: BackendSettings,
    pub logging: LoggingSettings,
}

/// Host kernel tuning
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Columns per private partial in column-parallel kernels
    pub column_chunk: usize,
    /// Run host kernels on the rayon pool
    pub parallel: bool,
    /// Lanes per row / column in the CPU lane emulation
    pub lane_width: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            column_chunk: 1024,
            parallel: true,
            lane_width: 32,
        }
    }
}

/// Device selection
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Default device: "cpu", "lanes", "gpu" or "auto"
    pub device: String,
    /// Expected connections above which `auto` considers the GPU
    pub gpu_element_threshold: usize,
    pub force_cpu: bool,
    pub force_gpu: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            device: "cpu".to_string(),
            gpu_element_threshold: 4_000_000,
            force_cpu: false,
            force_gpu: false,
        }
    }
}

/// Logging
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub log_dir: PathBuf,
    pub file_logging: bool,
    /// Number of run folders kept when file logging is enabled
    pub retention_runs: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            file_logging: false,
            retention_runs: 10,
        }
    }
}

/// Device names accepted by `backend.device`
pub const KNOWN_DEVICES: &[&str] = &["cpu", "lanes", "gpu", "wgpu", "auto"];

/// Level names accepted by `logging.level`
pub const KNOWN_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
