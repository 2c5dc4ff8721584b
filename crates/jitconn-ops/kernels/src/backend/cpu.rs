// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # CPU Backend
//!
//! Serial layout: one connection stream per row (row-parallel) or per column
//! (column-parallel), seeded with `seed + index`. Rows / column chunks are
//! spread over the rayon pool.

use jitconn_connectivity::{KernelFloat, Layout, Result};
use ndarray::Array2;

use super::kernel::HostKernels;
use super::ComputeBackend;
use crate::operand::OperandRef;
use crate::plan::MatvecPlan;

/// Default number of columns per private partial
pub const DEFAULT_COLUMN_CHUNK: usize = 1024;

/// CPU backend, serial connectivity layout
#[derive(Debug, Clone)]
pub struct CpuBackend {
    /// Backend name for logging
    name: String,

    kernels: HostKernels,
}

impl CpuBackend {
    /// Create a new CPU backend (parallel, default column chunk)
    pub fn new() -> Self {
        Self {
            name: "CPU (serial layout)".to_string(),
            kernels: HostKernels {
                layout: Layout::Serial,
                column_chunk: DEFAULT_COLUMN_CHUNK,
                parallel: true,
            },
        }
    }

    /// Build from the `[kernel]` section of the configuration
    pub fn from_config(config: &jitconn_config::JitconnConfig) -> Self {
        Self::new()
            .with_column_chunk(config.kernel.column_chunk)
            .with_parallel(config.kernel.parallel)
    }

    /// Columns per private partial in column-parallel kernels (min 1)
    pub fn with_column_chunk(mut self, column_chunk: usize) -> Self {
        self.kernels.column_chunk = column_chunk.max(1);
        self
    }

    /// Run on the rayon pool (`true`) or on the calling thread
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.kernels.parallel = parallel;
        self
    }

    pub fn column_chunk(&self) -> usize {
        self.kernels.column_chunk
    }

    pub fn is_parallel(&self) -> bool {
        self.kernels.parallel
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: KernelFloat> ComputeBackend<T> for CpuBackend {
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
