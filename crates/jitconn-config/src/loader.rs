// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers win:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, JitconnConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// File name searched for during discovery
pub const CONFIG_FILE_NAME: &str = "jitconn.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "JITCONN_CONFIG_PATH";

/// Find the configuration file
///
/// Search order:
/// 1. `JITCONN_CONFIG_PATH` environment variable
/// 2. Current working directory: `./jitconn.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by {} not found: {}",
            CONFIG_PATH_ENV,
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_ENV
    )))
}

/// Load configuration from a TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is discovered.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the config file is not found or contains invalid TOML
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<JitconnConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: JitconnConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Like [`load_config`], but starts from defaults when no file is discovered
///
/// An explicit `config_path` that cannot be read is still an error.
pub fn load_config_or_default(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<JitconnConfig> {
    if config_path.is_some() {
        return load_config(config_path, cli_args);
    }
    match find_config_file() {
        Ok(path) => load_config(Some(&path), cli_args),
        Err(ConfigError::FileNotFound(_)) => {
            let mut config = JitconnConfig::default();
            apply_environment_overrides(&mut config);
            if let Some(cli) = cli_args {
                apply_cli_overrides(&mut config, cli);
            }
            Ok(config)
        }
        Err(e) => Err(e),
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "true" || value == "1" || value == "yes"
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `JITCONN_COLUMN_CHUNK` -> `kernel.column_chunk`
/// - `JITCONN_PARALLEL` -> `kernel.parallel`
/// - `JITCONN_LANE_WIDTH` -> `kernel.lane_width`
/// - `JITCONN_DEVICE` -> `backend.device`
/// - `JITCONN_GPU_ELEMENT_THRESHOLD` -> `backend.gpu_element_threshold`
/// - `JITCONN_FORCE_CPU` -> `backend.force_cpu`
/// - `JITCONN_FORCE_GPU` -> `backend.force_gpu`
/// - `JITCONN_LOG_LEVEL` -> `logging.level`
/// - `JITCONN_LOG_DIR` -> `logging.log_dir`
pub fn apply_environment_overrides(config: &mut JitconnConfig) {
    if let Ok(value) = env::var("JITCONN_COLUMN_CHUNK") {
        if let Ok(chunk) = value.parse::<usize>() {
            config.kernel.column_chunk = chunk;
        }
    }
    if let Ok(value) = env::var("JITCONN_PARALLEL") {
        config.kernel.parallel = parse_flag(&value);
    }
    if let Ok(value) = env::var("JITCONN_LANE_WIDTH") {
        if let Ok(width) = value.parse::<u32>() {
            config.kernel.lane_width = width;
        }
    }

    if let Ok(value) = env::var("JITCONN_DEVICE") {
        config.backend.device = value;
    }
    if let Ok(value) = env::var("JITCONN_GPU_ELEMENT_THRESHOLD") {
        if let Ok(threshold) = value.parse::<usize>() {
            config.backend.gpu_element_threshold = threshold;
        }
    }
    if let Ok(value) = env::var("JITCONN_FORCE_CPU") {
        config.backend.force_cpu = parse_flag(&value);
    }
    if let Ok(value) = env::var("JITCONN_FORCE_GPU") {
        config.backend.force_gpu = parse_flag(&value);
    }

    if let Ok(value) = env::var("JITCONN_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("JITCONN_LOG_DIR") {
        config.logging.log_dir = PathBuf::from(value);
    }
}

/// Apply CLI argument overrides to configuration
///
/// Recognized keys: `column_chunk`, `parallel`, `lane_width`, `device`,
/// `log_level`. Values that fail to parse are ignored.
pub fn apply_cli_overrides(config: &mut JitconnConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("column_chunk") {
        if let Ok(chunk) = value.parse::<usize>() {
            config.kernel.column_chunk = chunk;
        }
    }
    if let Some(value) = cli_args.get("parallel") {
        config.kernel.parallel = parse_flag(value);
    }
    if let Some(value) = cli_args.get("lane_width") {
        if let Ok(width) = value.parse::<u32>() {
            config.kernel.lane_width = width;
        }
    }
    if let Some(value) = cli_args.get("device") {
        config.backend.device = value.clone();
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
}
