// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Connection-Probability API
//!
//! [`JitcProb`] builds operators from a connection probability instead of a
//! connection length: `clen = ceil(1 / conn_prob) * 2 - 1`. Without an
//! explicit seed every call draws a fresh random seed, so two calls realize
//! two independent matrices.
//!
//! ```
//! use jitconn_kernels::{CpuBackend, JitcProb};
//!
//! let op = JitcProb::new(0.1, (100, 50)).unwrap().seed(42);
//! let out = op.mv_homo::<f32>(&CpuBackend::new(), &vec![1.0f32; 50], 1.0).unwrap();
//! assert_eq!(out.len(), 100);
//! ```

use jitconn_connectivity::{
    check_dimension, clen_for_conn_prob, ConnParams, KernelFloat, Result, WeightSpec,
};
use ndarray::Array2;
use tracing::trace;

use crate::backend::ComputeBackend;
use crate::operand::OperandRef;
use crate::operator::JitMatvec;

/// Random-connectivity operators parameterized by connection probability
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitcProb {
    conn_prob: f64,
    clen: u32,
    seed: Option<u32>,
    shape: (usize, usize),
    transpose: bool,
    outdim_parallel: bool,
}

impl JitcProb {
    /// # Errors
    /// `InvalidConnProb` unless `0 < conn_prob <= 1`, `DimensionTooLarge`
    /// for oversized shapes.
    pub fn new(conn_prob: f64, shape: (usize, usize)) -> Result<Self> {
        check_dimension("rows", shape.0)?;
        check_dimension("cols", shape.1)?;
        Ok(Self {
            conn_prob,
            clen: clen_for_conn_prob(conn_prob)?,
            seed: None,
            shape,
            transpose: false,
            outdim_parallel: true,
        })
    }

    /// Fix the seed so every call realizes the same matrix
    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn transpose(mut self, transpose: bool) -> Self {
        self.transpose = transpose;
        self
    }

    pub fn outdim_parallel(mut self, outdim_parallel: bool) -> Self {
        self.outdim_parallel = outdim_parallel;
        self
    }

    pub fn conn_prob(&self) -> f64 {
        self.conn_prob
    }

    pub fn clen(&self) -> u32 {
        self.clen
    }

    pub fn fixed_seed(&self) -> Option<u32> {
        self.seed
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    fn operator<T: KernelFloat>(&self, weights: WeightSpec<T>) -> Result<JitMatvec<T>> {
        let seed = self.seed.unwrap_or_else(|| {
            let drawn = rand::random::<u32>();
            trace!("[JITCONN] drew seed {} for conn_prob {}", drawn, self.conn_prob);
            drawn
        });
        Ok(
            JitMatvec::new(weights, ConnParams::new(seed, self.clen)?, self.shape)?
                .transpose(self.transpose)
                .outdim_parallel(self.outdim_parallel),
        )
    }

    pub fn mv_homo<T: KernelFloat>(
        &self,
        backend: &dyn ComputeBackend<T>,
        vector: &[T],
        weight: T,
    ) -> Result<Vec<T>> {
        self.operator(WeightSpec::homogeneous(weight))?
            .apply(backend, OperandRef::Dense(vector))
    }

    pub fn mv_uniform<T: KernelFloat>(
        &self,
        backend: &dyn ComputeBackend<T>,
        vector: &[T],
        low: T,
        high: T,
    ) -> Result<Vec<T>> {
        self.operator(WeightSpec::uniform(low, high))?
            .apply(backend, OperandRef::Dense(vector))
    }

    pub fn mv_normal<T: KernelFloat>(
        &self,
        backend: &dyn ComputeBackend<T>,
        vector: &[T],
        mu: T,
        sigma: T,
    ) -> Result<Vec<T>> {
        self.operator(WeightSpec::normal(mu, sigma))?
            .apply(backend, OperandRef::Dense(vector))
    }

    pub fn event_mv_homo<T: KernelFloat>(
        &self,
        backend: &dyn ComputeBackend<T>,
        events: &[bool],
        weight: T,
    ) -> Result<Vec<T>> {
        self.operator(WeightSpec::homogeneous(weight))?
            .apply(backend, OperandRef::BoolEvents(events))
    }

    pub fn event_mv_uniform<T: KernelFloat>(
        &self,
        backend: &dyn ComputeBackend<T>,
        events: &[bool],
        low: T,
        high: T,
    ) -> Result<Vec<T>> {
        self.operator(WeightSpec::uniform(low, high))?
            .apply(backend, OperandRef::BoolEvents(events))
    }

    pub fn event_mv_normal<T: KernelFloat>(
        &self,
        backend: &dyn ComputeBackend<T>,
        events: &[bool],
        mu: T,
        sigma: T,
    ) -> Result<Vec<T>> {
        self.operator(WeightSpec::normal(mu, sigma))?
            .apply(backend, OperandRef::BoolEvents(events))
    }

    /// Connectivity scaled by `weight`
    pub fn homo_weight_matrix<T: KernelFloat>(
        &self,
        backend: &dyn ComputeBackend<T>,
        weight: T,
    ) -> Result<Array2<T>> {
        self.operator(WeightSpec::homogeneous(weight))?
            .weight_matrix(backend)
    }

    pub fn uniform_weight_matrix<T: KernelFloat>(
        &self,
        backend: &dyn ComputeBackend<T>,
        low: T,
        high: T,
    ) -> Result<Array2<T>> {
        self.operator(WeightSpec::uniform(low, high))?
            .weight_matrix(backend)
    }

    pub fn normal_weight_matrix<T: KernelFloat>(
        &self,
        backend: &dyn ComputeBackend<T>,
        mu: T,
        sigma: T,
    ) -> Result<Array2<T>> {
        self.operator(WeightSpec::normal(mu, sigma))?
            .weight_matrix(backend)
    }
}
