// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # jitconn Configuration System
//!
//! Type-safe configuration loader for the JIT connectivity kernels with
//! support for:
//! - TOML file parsing (`jitconn.toml`)
//! - Environment variable overrides (`JITCONN_*`)
//! - CLI argument overrides
//!
//! ## Usage
//!
//! ```rust,no_run
//! use jitconn_config::{load_config, validate_config};
//!
//! let config = load_config(None, None).expect("Failed to load config");
//! validate_config(&config).expect("Invalid config");
//!
//! println!("Column chunk: {}", config.kernel.column_chunk);
//! println!("Device: {}", config.backend.device);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{
    apply_cli_overrides, apply_environment_overrides, find_config_file, load_config,
    load_config_or_default, CONFIG_FILE_NAME, CONFIG_PATH_ENV,
};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_json() {
        let config = JitconnConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: JitconnConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kernel.column_chunk, config.kernel.column_chunk);
        assert_eq!(back.backend.device, config.backend.device);
    }
}
