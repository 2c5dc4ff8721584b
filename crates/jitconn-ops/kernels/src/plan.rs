// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Resolved kernel invocation handed to backends

use jitconn_connectivity::{ConnParams, WeightSpec};
use serde::{Deserialize, Serialize};

/// Kernel orientation `(out_dim, in_dim)`
///
/// `(rows, cols)` for a plain matvec, `(cols, rows)` when transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelShape {
    pub out_dim: u32,
    pub in_dim: u32,
}

impl KernelShape {
    pub fn new(out_dim: u32, in_dim: u32) -> Self {
        Self { out_dim, in_dim }
    }

    /// Number of matrix entries
    pub fn elements(&self) -> u64 {
        self.out_dim as u64 * self.in_dim as u64
    }

    /// Dimension walked by one stream (`in_dim` row-parallel, `out_dim` otherwise)
    pub fn walked_dim(&self, outdim_parallel: bool) -> u32 {
        if outdim_parallel {
            self.in_dim
        } else {
            self.out_dim
        }
    }

    /// Number of stream groups (rows row-parallel, columns otherwise)
    pub fn group_count(&self, outdim_parallel: bool) -> u32 {
        if outdim_parallel {
            self.out_dim
        } else {
            self.in_dim
        }
    }
}

/// Everything a backend needs to run one kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatvecPlan<T> {
    pub weights: WeightSpec<T>,
    pub conn: ConnParams,
    pub kernel: KernelShape,
    /// Row-parallel (`true`) or column-parallel (`false`) iteration
    pub outdim_parallel: bool,
}

impl<T> MatvecPlan<T> {
    /// Expected number of generated connections
    pub fn expected_connections(&self) -> f64 {
        let walked = self.kernel.walked_dim(self.outdim_parallel);
        self.kernel.group_count(self.outdim_parallel) as f64 * self.conn.expected_degree(walked)
    }

    pub fn order_name(&self) -> &'static str {
        if self.outdim_parallel {
            "row-parallel"
        } else {
            "column-parallel"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walked_dimension() {
        let shape = KernelShape::new(10, 20);
        assert_eq!(shape.walked_dim(true), 20);
        assert_eq!(shape.group_count(true), 10);
        assert_eq!(shape.walked_dim(false), 10);
        assert_eq!(shape.group_count(false), 20);
        assert_eq!(shape.elements(), 200);
    }

    #[test]
    fn test_expected_connections() {
        let plan = MatvecPlan {
            weights: WeightSpec::homogeneous(1.0f32),
            conn: ConnParams::new(0, 19).unwrap(),
            kernel: KernelShape::new(100, 1000),
            outdim_parallel: true,
        };
        assert!((plan.expected_connections() - 10_000.0).abs() < 1e-6);
        assert_eq!(plan.order_name(), "row-parallel");
    }
}
