// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # JIT Matvec Operator
//!
//! A [`JitMatvec`] describes one logical `rows x cols` random matrix
//! (weights, seed, clen) plus how it is applied:
//!
//! - `transpose = false`: `out = W · v`, `v` has `cols` entries
//! - `transpose = true`: `out = Wᵀ · v`, `v` has `rows` entries
//!
//! The kernel always walks its own orientation `(out_dim, in_dim)`, which is
//! `(rows, cols)` or `(cols, rows)`. `outdim_parallel` picks whether streams
//! run along output rows or input columns.

use jitconn_connectivity::{check_dimension, ConnParams, Error, KernelFloat, Result, WeightSpec};
use ndarray::Array2;
use tracing::debug;

use crate::backend::ComputeBackend;
use crate::operand::OperandRef;
use crate::plan::{KernelShape, MatvecPlan};

/// JIT connectivity matrix-vector operator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitMatvec<T> {
    weights: WeightSpec<T>,
    conn: ConnParams,
    rows: u32,
    cols: u32,
    transpose: bool,
    outdim_parallel: bool,
}

impl<T: KernelFloat> JitMatvec<T> {
    /// Operator over a logical `(rows, cols)` matrix
    ///
    /// Defaults to `transpose = false`, `outdim_parallel = true`.
    ///
    /// # Errors
    /// `DimensionTooLarge` when a dimension exceeds `MAX_DIMENSION`.
    pub fn new(weights: WeightSpec<T>, conn: ConnParams, shape: (usize, usize)) -> Result<Self> {
        Ok(Self {
            weights,
            conn,
            rows: check_dimension("rows", shape.0)?,
            cols: check_dimension("cols", shape.1)?,
            transpose: false,
            outdim_parallel: true,
        })
    }

    pub fn transpose(mut self, transpose: bool) -> Self {
        self.transpose = transpose;
        self
    }

    pub fn outdim_parallel(mut self, outdim_parallel: bool) -> Self {
        self.outdim_parallel = outdim_parallel;
        self
    }

    /// Same connectivity with other weight parameters
    pub fn with_weights(mut self, weights: WeightSpec<T>) -> Self {
        self.weights = weights;
        self
    }

    pub fn weights(&self) -> WeightSpec<T> {
        self.weights
    }

    pub fn conn(&self) -> ConnParams {
        self.conn
    }

    /// Logical `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows as usize, self.cols as usize)
    }

    pub fn is_transposed(&self) -> bool {
        self.transpose
    }

    pub fn is_outdim_parallel(&self) -> bool {
        self.outdim_parallel
    }

    /// Orientation the kernel walks
    pub fn kernel_shape(&self) -> KernelShape {
        if self.transpose {
            KernelShape::new(self.cols, self.rows)
        } else {
            KernelShape::new(self.rows, self.cols)
        }
    }

    /// Expected operand length
    pub fn input_len(&self) -> usize {
        self.kernel_shape().in_dim as usize
    }

    /// Output length
    pub fn output_len(&self) -> usize {
        self.kernel_shape().out_dim as usize
    }

    pub fn plan(&self) -> MatvecPlan<T> {
        MatvecPlan {
            weights: self.weights,
            conn: self.conn,
            kernel: self.kernel_shape(),
            outdim_parallel: self.outdim_parallel,
        }
    }

    /// Operator for the transposed product over the same connectivity
    ///
    /// Both `transpose` and `outdim_parallel` flip: the adjoint walks the
    /// streams of `self` with input and output exchanged, so it regenerates
    /// exactly `Wᵀ` (resp. `W`).
    pub fn adjoint(&self) -> Self {
        Self {
            transpose: !self.transpose,
            outdim_parallel: !self.outdim_parallel,
            ..*self
        }
    }

    /// Operator name used in logs and errors, e.g. `mv_prob_uniform`
    pub fn name(&self, operand: crate::operand::OperandKind) -> String {
        format!("{}mv_prob_{}", operand.prefix(), self.weights.mode().short_name())
    }

    /// Check the operand length against the operator
    ///
    /// # Errors
    /// `ShapeMismatch` with `vec (k,) @ mat (m, n)` for transposed operators
    /// and `mat (m, n) @ vec (k,)` otherwise.
    pub fn check_operand_len(&self, len: usize) -> Result<()> {
        if len == self.input_len() {
            return Ok(());
        }
        let detail = if self.transpose {
            format!("vec ({},) @ mat ({}, {})", len, self.rows, self.cols)
        } else {
            format!("mat ({}, {}) @ vec ({},)", self.rows, self.cols, len)
        };
        Err(Error::ShapeMismatch(detail))
    }

    /// Apply the operator to `operand`
    pub fn apply(
        &self,
        backend: &dyn ComputeBackend<T>,
        operand: OperandRef<'_, T>,
    ) -> Result<Vec<T>> {
        self.check_operand_len(operand.len())?;
        let plan = self.plan();
        debug!(
            "[JITCONN] {} {}x{} transpose={} {} on {}",
            self.name(operand.kind()),
            self.rows,
            self.cols,
            self.transpose,
            plan.order_name(),
            backend.backend_name()
        );
        backend.matvec(&plan, operand)
    }

    /// Logical `(rows, cols)` weight matrix `W`
    ///
    /// `apply(v) == W · v` untransposed and `Wᵀ · v` transposed.
    pub fn weight_matrix(&self, backend: &dyn ComputeBackend<T>) -> Result<Array2<T>> {
        let plan = self.plan();
        debug!(
            "[JITCONN] get_{}_weight_matrix {}x{} {} on {}",
            self.weights.mode().short_name(),
            self.rows,
            self.cols,
            plan.order_name(),
            backend.backend_name()
        );
        let matrix = backend.connectivity_matrix(&plan)?;
        Ok(if self.transpose {
            matrix.reversed_axes()
        } else {
            matrix
        })
    }
}
