// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for JIT connectivity operations

use super::dtype::DType;

/// Errors raised by validation, differentiation and backends
///
/// Validation variants name the offending argument (`vector`, `events`,
/// `weight`, `w_low`, `clen`, `seed`, `shape`, ...).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JitConnError {
    #[error("{argument} should be a 1D array, got rank {rank}")]
    RankMismatch { argument: String, rank: usize },

    #[error("{argument} must be a single-element 1D array, got {len} elements")]
    NotScalar { argument: String, len: usize },

    #[error("{argument} must be {expected} valued, got {actual}")]
    DTypeMismatch {
        argument: String,
        expected: &'static str,
        actual: DType,
    },

    #[error("shape should be a length-2 tuple, got {0:?}")]
    InvalidShape(Vec<usize>),

    #[error("Shape mismatch, {0}.")]
    ShapeMismatch(String),

    #[error("clen must be in 1..={max}, got {clen}")]
    InvalidConnLen { clen: i64, max: u32 },

    #[error("conn_prob must be in (0, 1], got {0}")]
    InvalidConnProb(f64),

    #[error("{argument} dimension {dim} exceeds the supported maximum {max}")]
    DimensionTooLarge {
        argument: String,
        dim: usize,
        max: u32,
    },

    #[error("invalid {argument}: {reason}")]
    InvalidArgument { argument: String, reason: String },

    #[error("Cannot differentiate {operator} through {argument}")]
    NotDifferentiable { operator: String, argument: String },

    #[error("device {0} is not available")]
    DeviceUnavailable(String),

    #[error("{dtype} is not supported by the {backend} backend")]
    UnsupportedDtype { dtype: DType, backend: String },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid backend: {0}")]
    InvalidBackend(String),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),
}

pub type Result<T> = core::result::Result<T, JitConnError>;
pub type Error = JitConnError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_argument() {
        let err = JitConnError::RankMismatch {
            argument: "seed".to_string(),
            rank: 2,
        };
        assert!(err.to_string().contains("seed"));

        let err = JitConnError::ShapeMismatch("mat (3, 4) @ vec (5,)".to_string());
        assert_eq!(err.to_string(), "Shape mismatch, mat (3, 4) @ vec (5,).");

        let err = JitConnError::NotDifferentiable {
            operator: "mv_prob_homo".to_string(),
            argument: "clen".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot differentiate mv_prob_homo through clen");
    }
}
