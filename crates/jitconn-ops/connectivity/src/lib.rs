// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # JIT Connectivity (Platform-Agnostic)
//!
//! Everything needed to regenerate sparse random connectivity on demand:
//! - **PRNG**: lfsr88 keys ([`Lfsr88Key`])
//! - **Generator**: skip-sampled connection streams ([`ConnectionStream`])
//! - **Partitioning**: contiguous lane blocks for the GPU layout ([`LanePartition`])
//! - **Weights**: homogeneous / uniform / normal samplers ([`WeightSpec`])
//! - **Types**: value trait, dtypes and the shared error type
//!
//! Nothing here allocates; the kernels crate builds matvec operators on top.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod connectivity;
pub mod prng;
pub mod sampler;
pub mod types;

pub use connectivity::{
    check_dimension, clen_for_conn_prob, ConnParams, ConnectionStream, LanePartition, Layout,
    MAX_DIMENSION,
};
pub use prng::{Lfsr88Key, NORMAL_EPSILON, UNIT_SCALE};
pub use sampler::{
    HomogeneousSampler, NormalSampler, UniformSampler, WeightMode, WeightSampler, WeightSpec,
};
pub use types::{DType, Error, JitConnError, KernelFloat, Result};
