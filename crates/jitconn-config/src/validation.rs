// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Collects every violation before failing, so one run reports all of them.

use crate::types::{KNOWN_DEVICES, KNOWN_LOG_LEVELS};
use crate::{ConfigError, ConfigResult, JitconnConfig};

/// Largest lane width accepted for the CPU lane emulation
pub const MAX_LANE_WIDTH: u32 = 1024;

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    OutOfRange { field: String, value: String, range: String },
    UnknownName { field: String, value: String, allowed: String },
    Conflict { field1: String, field2: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { field, value, range } => {
                write!(f, "{} = {} is outside valid range ({})", field, value, range)
            }
            Self::UnknownName {
                field,
                value,
                allowed,
            } => {
                write!(f, "{} = '{}' is not one of: {}", field, value, allowed)
            }
            Self::Conflict { field1, field2 } => {
                write!(f, "{} and {} cannot both be set", field1, field2)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &JitconnConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_kernel(config, &mut errors);
    validate_backend(config, &mut errors);
    validate_logging(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_kernel(config: &JitconnConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.kernel.column_chunk == 0 {
        errors.push(ConfigValidationError::OutOfRange {
            field: "kernel.column_chunk".to_string(),
            value: "0".to_string(),
            range: ">= 1".to_string(),
        });
    }
    if config.kernel.lane_width == 0 || config.kernel.lane_width > MAX_LANE_WIDTH {
        errors.push(ConfigValidationError::OutOfRange {
            field: "kernel.lane_width".to_string(),
            value: config.kernel.lane_width.to_string(),
            range: format!("1-{}", MAX_LANE_WIDTH),
        });
    }
}

fn validate_backend(config: &JitconnConfig, errors: &mut Vec<ConfigValidationError>) {
    let device = config.backend.device.to_lowercase();
    if !KNOWN_DEVICES.contains(&device.as_str()) {
        errors.push(ConfigValidationError::UnknownName {
            field: "backend.device".to_string(),
            value: config.backend.device.clone(),
            allowed: KNOWN_DEVICES.join(", "),
        });
    }
    if config.backend.force_cpu && config.backend.force_gpu {
        errors.push(ConfigValidationError::Conflict {
            field1: "backend.force_cpu".to_string(),
            field2: "backend.force_gpu".to_string(),
        });
    }
}

fn validate_logging(config: &JitconnConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.level.to_lowercase();
    if !KNOWN_LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::UnknownName {
            field: "logging.level".to_string(),
            value: config.logging.level.clone(),
            allowed: KNOWN_LOG_LEVELS.join(", "),
        });
    }
    if config.logging.file_logging && config.logging.retention_runs == 0 {
        errors.push(ConfigValidationError::OutOfRange {
            field: "logging.retention_runs".to_string(),
            value: "0".to_string(),
            range: ">= 1 when file logging is enabled".to_string(),
        });
    }
}
