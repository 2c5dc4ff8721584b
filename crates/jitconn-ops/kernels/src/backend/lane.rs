// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # CPU Lane Backend
//!
//! Runs the GPU lane layout on the CPU: each row / column is covered by
//! `width` lane streams over contiguous blocks. With the warp width this is
//! the host reference for the WGSL kernels.

use jitconn_connectivity::{KernelFloat, LanePartition, Layout, Result};
use ndarray::Array2;

use super::cpu::DEFAULT_COLUMN_CHUNK;
use super::kernel::HostKernels;
use super::ComputeBackend;
use crate::operand::OperandRef;
use crate::plan::MatvecPlan;

/// CPU emulation of the lane layout
#[derive(Debug, Clone)]
pub struct LaneBackend {
    name: String,
    partition: LanePartition,
    kernels: HostKernels,
}

impl LaneBackend {
    pub fn new(partition: LanePartition) -> Self {
        Self {
            name: format!("CPU (lanes x{})", partition.width()),
            partition,
            kernels: HostKernels {
                layout: Layout::Lanes(partition),
                column_chunk: DEFAULT_COLUMN_CHUNK,
                parallel: true,
            },
        }
    }

    /// Lane layout of the GPU backend (32 lanes)
    pub fn warp() -> Self {
        Self::new(LanePartition::warp())
    }

    /// Build from the `[kernel]` section of the configuration
    ///
    /// # Errors
    /// `InvalidArgument` when `lane_width` is zero.
    pub fn from_config(config: &jitconn_config::JitconnConfig) -> Result<Self> {
        let partition = LanePartition::new(config.kernel.lane_width)?;
        Ok(Self::new(partition)
            .with_column_chunk(config.kernel.column_chunk)
            .with_parallel(config.kernel.parallel))
    }

    pub fn with_column_chunk(mut self, column_chunk: usize) -> Self {
        self.kernels.column_chunk = column_chunk.max(1);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.kernels.parallel = parallel;
        self
    }

    pub fn partition(&self) -> LanePartition {
        self.partition
    }
}

impl Default for LaneBackend {
    fn default() -> Self {
        Self::warp()
    }
}

impl<T: KernelFloat> ComputeBackend<T> for LaneBackend {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn layout(&self) -> Layout {
        self.kernels.layout
    }

    fn matvec(&self, plan: &MatvecPlan<T>, operand: OperandRef<'_, T>) -> Result<Vec<T>> {
        Ok(self.kernels.matvec(plan, operand))
    }

    fn connectivity_matrix(&self, plan: &MatvecPlan<T>) -> Result<Array2<T>> {
        self.kernels.connectivity_matrix(plan)
    }
}
