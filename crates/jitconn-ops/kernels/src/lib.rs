// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! # JIT Connectivity Kernels
//!
//! Matrix-vector products with sparse random matrices that are never stored.
//! Every connection is regenerated from `(seed, clen)` while the kernel runs.
//!
//! ## Layers
//! - **Operators**: [`JitMatvec`] (typed) and [`JitcProb`] (connection probability)
//! - **Backends**: [`CpuBackend`], [`LaneBackend`], `WgpuBackend` (feature `gpu`)
//! - **Differentiation**: JVP / transpose rules on [`JitMatvec`]
//! - **Dispatch**: [`Dispatcher`] over [`HostArray`]s, driven by the [`OperatorRegistry`]
//!
//! ## Determinism
//! - Same backend, same configuration: bit-identical results
//! - Column-parallel CPU work is reduced in a fixed chunk order
//! - Across backends: equal within floating-point tolerance

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod autodiff;
pub mod backend;
pub mod conn_prob;
pub mod dispatch;
pub mod host;
pub mod operand;
pub mod operator;
pub mod plan;
pub mod registry;
pub mod validation;

pub use autodiff::Argument;
#[cfg(feature = "gpu")]
pub use backend::WgpuBackend;
pub use backend::{
    create_backend, is_gpu_available, select_backend, BackendConfig, BackendDecision, BackendType,
    ComputeBackend, CpuBackend, LaneBackend, DEFAULT_COLUMN_CHUNK,
};
pub use conn_prob::JitcProb;
pub use dispatch::{
    DispatchFloat, Device, Dispatcher, MatvecCall, OperandData, WeightArgs, WeightMatrixCall,
};
pub use host::{HostArray, HostFloat};
pub use operand::{BoolEvents, DenseOperand, FloatEvents, Operand, OperandKind, OperandRef};
pub use operator::JitMatvec;
pub use plan::{KernelShape, MatvecPlan};
pub use registry::{
    ArgumentRule, ArgumentSpec, JvpRule, OperatorDescriptor, OperatorId, OperatorRegistry,
    Primitive, TransposeRule,
};

pub use jitconn_connectivity::{
    ConnParams, DType, Error, JitConnError, KernelFloat, LanePartition, Layout, Result,
    WeightMode, WeightSpec,
};
