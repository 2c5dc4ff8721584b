// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Host-Array Dispatcher
//!
//! Entry point for dynamically typed callers. A call names its operator
//! variant through the operand kind, the weight arguments and the iteration
//! order; the dispatcher:
//!
//! 1. looks the variant up in its [`OperatorRegistry`]
//! 2. validates every argument before allocating an output
//! 3. branches on the weight dtype (`f32` / `f64`)
//! 4. resolves the device to a [`ComputeBackend`] and runs the kernel
//!
//! Differentiation requests ([`Dispatcher::jvp`], [`Dispatcher::transpose`])
//! interpret the rule bundle the registry stores for the argument.

use std::borrow::Cow;
#[cfg(feature = "gpu")]
use std::sync::OnceLock;

use jitconn_connectivity::{ConnParams, DType, Error, Result, WeightMode, WeightSpec};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
#[cfg(feature = "gpu")]
use tracing::warn;
use tracing::{debug, info};

#[cfg(feature = "gpu")]
use crate::backend::WgpuBackend;
use crate::backend::{
    select_backend, BackendConfig, BackendType, ComputeBackend, CpuBackend, LaneBackend,
};
use crate::host::{contiguous, vector_into_host, HostArray, HostFloat};
use crate::operand::{OperandKind, OperandRef};
use crate::operator::JitMatvec;
use crate::registry::{
    ArgumentRule, JvpRule, OperatorDescriptor, OperatorId, OperatorRegistry, TransposeRule,
};
use crate::validation::{
    check_vector, conn_len, float_array, float_scalar, resolve_shape, seed, weight_dtype,
};

/// Device tag of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Device {
    /// Serial layout on the CPU
    #[default]
    Cpu,
    /// Lane layout emulated on the CPU
    Lanes,
    /// Lane layout on the GPU (`f32` only)
    Gpu,
    /// Pick per call from the expected work and dtype
    ///
    /// The realized connectivity follows the chosen backend's layout: the
    /// serial CPU layout below the GPU threshold, the 32-lane layout above
    /// it (emulated on the CPU when the adapter fails to initialize).
    Auto,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Lanes => write!(f, "lanes"),
            Device::Gpu => write!(f, "gpu"),
            Device::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "lanes" => Ok(Device::Lanes),
            "gpu" | "wgpu" => Ok(Device::Gpu),
            "auto" => Ok(Device::Auto),
            other => Err(Error::InvalidBackend(other.to_string())),
        }
    }
}

/// Weight parameter arrays of a call, one variant per weight mode
#[derive(Debug, Clone, Copy)]
pub enum WeightArgs<'a> {
    Homogeneous {
        weight: &'a HostArray,
    },
    Uniform {
        low: &'a HostArray,
        high: &'a HostArray,
    },
    Normal {
        mu: &'a HostArray,
        sigma: &'a HostArray,
    },
}

impl<'a> WeightArgs<'a> {
    pub fn mode(&self) -> WeightMode {
        match self {
            WeightArgs::Homogeneous { .. } => WeightMode::Homogeneous,
            WeightArgs::Uniform { .. } => WeightMode::Uniform,
            WeightArgs::Normal { .. } => WeightMode::Normal,
        }
    }

    /// First parameter, whose dtype fixes the value type of the call
    fn primary(&self) -> (&'static str, &'a HostArray) {
        match *self {
            WeightArgs::Homogeneous { weight } => ("weight", weight),
            WeightArgs::Uniform { low, .. } => ("w_low", low),
            WeightArgs::Normal { mu, .. } => ("w_mu", mu),
        }
    }

    /// Scalar weight parameters of type `T`
    pub fn resolve<T: HostFloat>(&self) -> Result<WeightSpec<T>> {
        Ok(match *self {
            WeightArgs::Homogeneous { weight } => {
                WeightSpec::homogeneous(float_scalar("weight", weight)?)
            }
            WeightArgs::Uniform { low, high } => {
                WeightSpec::uniform(float_scalar("w_low", low)?, float_scalar("w_high", high)?)
            }
            WeightArgs::Normal { mu, sigma } => {
                WeightSpec::normal(float_scalar("w_mu", mu)?, float_scalar("w_sigma", sigma)?)
            }
        })
    }
}

/// One matvec invocation
#[derive(Debug, Clone, Copy)]
pub struct MatvecCall<'a> {
    pub operand: &'a HostArray,
    pub operand_kind: OperandKind,
    pub weights: WeightArgs<'a>,
    pub clen: &'a HostArray,
    pub seed: &'a HostArray,
    /// Logical `(rows, cols)`
    pub shape: &'a [usize],
    pub transpose: bool,
    pub outdim_parallel: bool,
    /// `None` uses the dispatcher's default device
    pub device: Option<Device>,
}

impl<'a> MatvecCall<'a> {
    /// Untransposed, row-parallel call on the default device
    pub fn new(
        operand: &'a HostArray,
        operand_kind: OperandKind,
        weights: WeightArgs<'a>,
        clen: &'a HostArray,
        seed: &'a HostArray,
        shape: &'a [usize],
    ) -> Self {
        Self {
            operand,
            operand_kind,
            weights,
            clen,
            seed,
            shape,
            transpose: false,
            outdim_parallel: true,
            device: None,
        }
    }

    pub fn transpose(mut self, transpose: bool) -> Self {
        self.transpose = transpose;
        self
    }

    pub fn outdim_parallel(mut self, outdim_parallel: bool) -> Self {
        self.outdim_parallel = outdim_parallel;
        self
    }

    pub fn on(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    pub fn id(&self) -> OperatorId {
        OperatorId::matvec(self.operand_kind, self.weights.mode(), self.outdim_parallel)
    }
}

/// One weight-matrix materialization
#[derive(Debug, Clone, Copy)]
pub struct WeightMatrixCall<'a> {
    pub weights: WeightArgs<'a>,
    pub clen: &'a HostArray,
    pub seed: &'a HostArray,
    pub shape: &'a [usize],
    pub transpose: bool,
    pub outdim_parallel: bool,
    pub device: Option<Device>,
}

impl<'a> WeightMatrixCall<'a> {
    pub fn new(
        weights: WeightArgs<'a>,
        clen: &'a HostArray,
        seed: &'a HostArray,
        shape: &'a [usize],
    ) -> Self {
        Self {
            weights,
            clen,
            seed,
            shape,
            transpose: false,
            outdim_parallel: true,
            device: None,
        }
    }

    pub fn transpose(mut self, transpose: bool) -> Self {
        self.transpose = transpose;
        self
    }

    pub fn outdim_parallel(mut self, outdim_parallel: bool) -> Self {
        self.outdim_parallel = outdim_parallel;
        self
    }

    pub fn on(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    pub fn id(&self) -> OperatorId {
        OperatorId::weight_matrix(self.weights.mode(), self.outdim_parallel)
    }
}

/// Validated operand, borrowed when the host array is contiguous
#[derive(Debug, Clone)]
pub enum OperandData<'a, T: Clone> {
    Dense(Cow<'a, [T]>),
    BoolEvents(Cow<'a, [bool]>),
    FloatEvents(Cow<'a, [T]>),
}

impl<T: Clone> OperandData<'_, T> {
    pub fn as_ref(&self) -> OperandRef<'_, T> {
        match self {
            OperandData::Dense(values) => OperandRef::Dense(values),
            OperandData::BoolEvents(events) => OperandRef::BoolEvents(events),
            OperandData::FloatEvents(events) => OperandRef::FloatEvents(events),
        }
    }
}

/// Value types the dispatcher can run, with their GPU backend if any
pub trait DispatchFloat: HostFloat {
    fn gpu_backend(dispatcher: &Dispatcher) -> Result<&dyn ComputeBackend<Self>>;
}

impl DispatchFloat for f32 {
    #[cfg(feature = "gpu")]
    fn gpu_backend(dispatcher: &Dispatcher) -> Result<&dyn ComputeBackend<f32>> {
        let backend: &dyn ComputeBackend<f32> = dispatcher.wgpu()?;
        Ok(backend)
    }

    #[cfg(not(feature = "gpu"))]
    fn gpu_backend(_dispatcher: &Dispatcher) -> Result<&dyn ComputeBackend<f32>> {
        Err(Error::DeviceUnavailable(
            "gpu (built without the `gpu` feature)".to_string(),
        ))
    }
}

impl DispatchFloat for f64 {
    fn gpu_backend(_dispatcher: &Dispatcher) -> Result<&dyn ComputeBackend<f64>> {
        Err(Error::UnsupportedDtype {
            dtype: DType::F64,
            backend: "WGPU".to_string(),
        })
    }
}

/// Registry-driven dispatcher over host arrays
pub struct Dispatcher {
    registry: OperatorRegistry,
    cpu: CpuBackend,
    lanes: LaneBackend,
    /// Stands in for the GPU with the same 32-lane layout
    warp: LaneBackend,
    backend_config: BackendConfig,
    default_device: Device,
    #[cfg(feature = "gpu")]
    gpu: OnceLock<Result<WgpuBackend>>,
}

impl Dispatcher {
    /// Standard registry, default backends, CPU as default device
    pub fn new() -> Self {
        Self {
            registry: OperatorRegistry::standard(),
            cpu: CpuBackend::new(),
            lanes: LaneBackend::warp(),
            warp: LaneBackend::warp(),
            backend_config: BackendConfig::default(),
            default_device: Device::Cpu,
            #[cfg(feature = "gpu")]
            gpu: OnceLock::new(),
        }
    }

    /// Build from a loaded configuration
    ///
    /// # Errors
    /// `InvalidArgument` for a zero lane width, `InvalidBackend` for an
    /// unknown `backend.device`.
    pub fn from_config(config: &jitconn_config::JitconnConfig) -> Result<Self> {
        let default_device: Device = config.backend.device.parse()?;
        info!(
            "🔧 Dispatcher configured: device={}, column_chunk={}, lane_width={}",
            default_device, config.kernel.column_chunk, config.kernel.lane_width
        );
        Ok(Self {
            registry: OperatorRegistry::standard(),
            cpu: CpuBackend::from_config(config),
            lanes: LaneBackend::from_config(config)?,
            warp: LaneBackend::warp()
                .with_column_chunk(config.kernel.column_chunk)
                .with_parallel(config.kernel.parallel),
            backend_config: BackendConfig::from(&config.backend),
            default_device,
            #[cfg(feature = "gpu")]
            gpu: OnceLock::new(),
        })
    }

    pub fn with_default_device(mut self, device: Device) -> Self {
        self.default_device = device;
        self
    }

    pub fn default_device(&self) -> Device {
        self.default_device
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Run a matvec
    ///
    /// Returns a rank-1 array of the non-contracted length with the weight
    /// dtype.
    pub fn invoke(&self, call: &MatvecCall<'_>) -> Result<HostArray> {
        let descriptor = self.descriptor(&call.id(), call.device)?;
        match self.value_dtype(&call.weights)? {
            DType::F32 => self.invoke_typed::<f32>(descriptor, call),
            _ => self.invoke_typed::<f64>(descriptor, call),
        }
    }

    /// Materialize the logical `(rows, cols)` weight matrix
    ///
    /// Homogeneous weights give the `i32` 0/1 connectivity, sampled weights
    /// give the float matrix.
    pub fn weight_matrix(&self, call: &WeightMatrixCall<'_>) -> Result<HostArray> {
        let descriptor = self.descriptor(&call.id(), call.device)?;
        match self.value_dtype(&call.weights)? {
            DType::F32 => self.weight_matrix_typed::<f32>(descriptor, call),
            _ => self.weight_matrix_typed::<f64>(descriptor, call),
        }
    }

    /// Forward-mode derivative of `call` along `argument`
    ///
    /// The tangent is a float vector of the operand length for the operand,
    /// a single-element float array for the homogeneous weight.
    pub fn jvp(
        &self,
        call: &MatvecCall<'_>,
        argument: &str,
        tangent: &HostArray,
    ) -> Result<HostArray> {
        let descriptor = self.descriptor(&call.id(), call.device)?;
        let (jvp, _) = differentiable_rule(descriptor, argument)?;
        match self.value_dtype(&call.weights)? {
            DType::F32 => self.jvp_typed::<f32>(call, jvp, tangent),
            _ => self.jvp_typed::<f64>(call, jvp, tangent),
        }
    }

    /// Reverse-mode cotangent of `argument` for an output cotangent
    ///
    /// `None` is a symbolic zero. The operand cotangent does not read
    /// `call.operand`; the weight cotangent does.
    pub fn transpose(
        &self,
        call: &MatvecCall<'_>,
        argument: &str,
        cotangent: Option<&HostArray>,
    ) -> Result<HostArray> {
        let descriptor = self.descriptor(&call.id(), call.device)?;
        let (_, transpose) = differentiable_rule(descriptor, argument)?;
        match self.value_dtype(&call.weights)? {
            DType::F32 => self.transpose_typed::<f32>(call, transpose, cotangent),
            _ => self.transpose_typed::<f64>(call, transpose, cotangent),
        }
    }

    fn descriptor(&self, id: &OperatorId, device: Option<Device>) -> Result<&OperatorDescriptor> {
        let descriptor = self.registry.get(id)?;
        let device = device.unwrap_or(self.default_device);
        if !descriptor.supports(device) {
            return Err(Error::DeviceUnavailable(format!(
                "{} for {}",
                device, descriptor.name
            )));
        }
        Ok(descriptor)
    }

    fn value_dtype(&self, weights: &WeightArgs<'_>) -> Result<DType> {
        let (name, array) = weights.primary();
        weight_dtype(name, array)
    }

    fn invoke_typed<T: DispatchFloat>(
        &self,
        descriptor: &OperatorDescriptor,
        call: &MatvecCall<'_>,
    ) -> Result<HostArray> {
        let operator = matvec_operator::<T>(call)?;
        let operand = operand_data::<T>(call.operand_kind, call.operand)?;
        operator.check_operand_len(operand.as_ref().len())?;

        let backend = self.backend_for(call.device, &operator)?;
        debug!("[DISPATCH] {} on {}", descriptor.id.variant_name(), backend.backend_name());
        let out = operator.apply(backend, operand.as_ref())?;
        Ok(vector_into_host(out))
    }

    fn weight_matrix_typed<T: DispatchFloat>(
        &self,
        descriptor: &OperatorDescriptor,
        call: &WeightMatrixCall<'_>,
    ) -> Result<HostArray> {
        let weights = call.weights.resolve::<T>()?;
        let operator = build_operator(
            weights,
            call.clen,
            call.seed,
            call.shape,
            call.transpose,
            call.outdim_parallel,
        )?;

        debug!("[DISPATCH] {}", descriptor.id.variant_name());
        match weights {
            WeightSpec::Homogeneous { .. } => {
                let unit = operator.with_weights(WeightSpec::homogeneous(T::ONE));
                let backend = self.backend_for(call.device, &unit)?;
                let matrix = unit.weight_matrix(backend)?;
                let connectivity: Array2<i32> = matrix.mapv(|w| i32::from(w != T::ZERO));
                Ok(HostArray::from(connectivity))
            }
            _ => {
                let backend = self.backend_for(call.device, &operator)?;
                let matrix = operator.weight_matrix(backend)?;
                Ok(T::into_host(matrix.into_dyn()))
            }
        }
    }

    fn jvp_typed<T: DispatchFloat>(
        &self,
        call: &MatvecCall<'_>,
        rule: JvpRule,
        tangent: &HostArray,
    ) -> Result<HostArray> {
        let operator = matvec_operator::<T>(call)?;
        let backend = self.backend_for(call.device, &operator)?;
        let out = match rule {
            JvpRule::ApplyToTangent => {
                let tangent = float_vector::<T>("tangent", tangent)?;
                operator.jvp_operand(backend, call.operand_kind, &tangent)?
            }
            JvpRule::SubstituteWeight => {
                let weight_tangent = float_scalar::<T>("tangent", tangent)?;
                let operand = operand_data::<T>(call.operand_kind, call.operand)?;
                operator.jvp_weight(backend, operand.as_ref(), weight_tangent)?
            }
        };
        Ok(vector_into_host(out))
    }

    fn transpose_typed<T: DispatchFloat>(
        &self,
        call: &MatvecCall<'_>,
        rule: TransposeRule,
        cotangent: Option<&HostArray>,
    ) -> Result<HostArray> {
        let operator = matvec_operator::<T>(call)?;
        let cotangent = cotangent
            .map(|ct| float_vector::<T>("cotangent", ct))
            .transpose()?;
        let backend = self.backend_for(call.device, &operator)?;
        match rule {
            TransposeRule::Adjoint => {
                let out =
                    operator.transpose_operand(backend, call.operand_kind, cotangent.as_deref())?;
                Ok(vector_into_host(out))
            }
            TransposeRule::WeightReduction => {
                let operand = operand_data::<T>(call.operand_kind, call.operand)?;
                let grad =
                    operator.transpose_weight(backend, operand.as_ref(), cotangent.as_deref())?;
                Ok(vector_into_host(vec![grad]))
            }
        }
    }

    /// Concrete backend for a device tag
    fn backend_for<T: DispatchFloat>(
        &self,
        device: Option<Device>,
        operator: &JitMatvec<T>,
    ) -> Result<&dyn ComputeBackend<T>> {
        let cpu: &dyn ComputeBackend<T> = &self.cpu;
        let lanes: &dyn ComputeBackend<T> = &self.lanes;
        match device.unwrap_or(self.default_device) {
            Device::Cpu => Ok(cpu),
            Device::Lanes => Ok(lanes),
            Device::Gpu => T::gpu_backend(self),
            Device::Auto => {
                let expected = operator.plan().expected_connections() as usize;
                let decision = select_backend(expected, T::DTYPE, &self.backend_config);
                info!(
                    "🎯 Backend auto-selection: {} ({})",
                    decision.backend_type, decision.reason
                );
                match decision.backend_type {
                    #[cfg(feature = "gpu")]
                    BackendType::Wgpu => match T::gpu_backend(self) {
                        Ok(backend) => Ok(backend),
                        Err(e) => {
                            warn!(
                                "⚠️  GPU backend unavailable ({}), falling back to {}",
                                e,
                                self.gpu_fallback::<T>().backend_name()
                            );
                            Ok(self.gpu_fallback())
                        }
                    },
                    BackendType::Lanes => Ok(lanes),
                    BackendType::Cpu | BackendType::Auto => Ok(cpu),
                }
            }
        }
    }

    /// CPU backend walking the GPU's streams
    #[cfg(any(feature = "gpu", test))]
    fn gpu_fallback<T: DispatchFloat>(&self) -> &dyn ComputeBackend<T> {
        &self.warp
    }

    /// Lazily created GPU backend, shared by all calls
    #[cfg(feature = "gpu")]
    fn wgpu(&self) -> Result<&WgpuBackend> {
        self.gpu
            .get_or_init(|| {
                info!("🎮 Initializing WGPU backend");
                WgpuBackend::new()
            })
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("operators", &self.registry.len())
            .field("cpu", &self.cpu)
            .field("lanes", &self.lanes)
            .field("warp", &self.warp)
            .field("backend_config", &self.backend_config)
            .field("default_device", &self.default_device)
            .finish()
    }
}

fn differentiable_rule(
    descriptor: &OperatorDescriptor,
    argument: &str,
) -> Result<(JvpRule, TransposeRule)> {
    let spec = descriptor.argument(argument)?;
    match spec.rule {
        ArgumentRule::Differentiable { jvp, transpose } => Ok((jvp, transpose)),
        ArgumentRule::NotDifferentiable => Err(Error::NotDifferentiable {
            operator: descriptor.name.clone(),
            argument: spec.name.to_string(),
        }),
    }
}

fn build_operator<T: HostFloat>(
    weights: WeightSpec<T>,
    clen: &HostArray,
    seed_array: &HostArray,
    shape: &[usize],
    transpose: bool,
    outdim_parallel: bool,
) -> Result<JitMatvec<T>> {
    let shape = resolve_shape(shape)?;
    let conn = ConnParams::new(seed(seed_array)?, conn_len(clen)?)?;
    Ok(JitMatvec::new(weights, conn, shape)?
        .transpose(transpose)
        .outdim_parallel(outdim_parallel))
}

fn matvec_operator<T: HostFloat>(call: &MatvecCall<'_>) -> Result<JitMatvec<T>> {
    build_operator(
        call.weights.resolve::<T>()?,
        call.clen,
        call.seed,
        call.shape,
        call.transpose,
        call.outdim_parallel,
    )
}

fn operand_data<T: HostFloat>(kind: OperandKind, array: &HostArray) -> Result<OperandData<'_, T>> {
    let name = kind.argument_name();
    check_vector(name, array)?;
    Ok(match kind {
        OperandKind::Dense => OperandData::Dense(contiguous(float_array::<T>(name, array)?)),
        OperandKind::BoolEvents => {
            let events = array.as_bool().ok_or_else(|| Error::DTypeMismatch {
                argument: name.to_string(),
                expected: "bool",
                actual: array.dtype(),
            })?;
            OperandData::BoolEvents(contiguous(events))
        }
        OperandKind::FloatEvents => {
            OperandData::FloatEvents(contiguous(float_array::<T>(name, array)?))
        }
    })
}

fn float_vector<'a, T: HostFloat>(argument: &str, array: &'a HostArray) -> Result<Cow<'a, [T]>> {
    check_vector(argument, array)?;
    Ok(contiguous(float_array::<T>(argument, array)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jitconn_connectivity::{LanePartition, Layout};

    #[test]
    fn test_device_parse() {
        assert_eq!("CPU".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("wgpu".parse::<Device>().unwrap(), Device::Gpu);
        assert_eq!("lanes".parse::<Device>().unwrap(), Device::Lanes);
        assert!("tpu".parse::<Device>().is_err());
        assert_eq!(Device::Auto.to_string(), "auto");
    }

    #[test]
    fn test_weight_args_resolve() {
        let low = HostArray::scalar(-1.0f32);
        let high = HostArray::scalar(2.0f32);
        let args = WeightArgs::Uniform {
            low: &low,
            high: &high,
        };
        assert_eq!(args.mode(), WeightMode::Uniform);
        assert_eq!(args.resolve::<f32>().unwrap(), WeightSpec::uniform(-1.0, 2.0));
        assert!(args.resolve::<f64>().is_err());
    }

    #[test]
    fn test_invoke_dense_homogeneous() {
        let dispatcher = Dispatcher::new();
        let v = HostArray::from(vec![1.0f32; 8]);
        let w = HostArray::scalar(0.5f32);
        let clen = HostArray::scalar(1i32);
        let seed = HostArray::scalar(3u32);
        let shape = [4, 8];
        let call = MatvecCall::new(
            &v,
            OperandKind::Dense,
            WeightArgs::Homogeneous { weight: &w },
            &clen,
            &seed,
            &shape,
        );
        // clen 1 connects everything
        let out = dispatcher.invoke(&call).unwrap();
        assert_eq!(out, HostArray::from(vec![4.0f32; 4]));
    }

    #[test]
    fn test_f64_rejected_on_gpu() {
        let dispatcher = Dispatcher::new();
        let v = HostArray::from(vec![1.0f64; 3]);
        let w = HostArray::scalar(1.0f64);
        let clen = HostArray::scalar(3i32);
        let seed = HostArray::scalar(0i32);
        let shape = [3, 3];
        let call = MatvecCall::new(
            &v,
            OperandKind::Dense,
            WeightArgs::Homogeneous { weight: &w },
            &clen,
            &seed,
            &shape,
        )
        .on(Device::Gpu);
        assert_eq!(
            dispatcher.invoke(&call).unwrap_err(),
            Error::UnsupportedDtype {
                dtype: DType::F64,
                backend: "WGPU".to_string()
            }
        );
    }

    #[test]
    fn test_gpu_fallback_keeps_lane_layout() {
        let mut config = jitconn_config::JitconnConfig::default();
        config.kernel.lane_width = 4;
        let dispatcher = Dispatcher::from_config(&config).unwrap();
        let fallback = dispatcher.gpu_fallback::<f32>();
        assert_eq!(fallback.layout(), Layout::Lanes(LanePartition::warp()));
        assert_ne!(
            ComputeBackend::<f32>::layout(&dispatcher.lanes),
            fallback.layout()
        );
    }

    #[test]
    fn test_homogeneous_matrix_is_binary() {
        let dispatcher = Dispatcher::new();
        let w = HostArray::scalar(2.5f32);
        let clen = HostArray::scalar(3i32);
        let seed = HostArray::scalar(11i32);
        let shape = [5, 6];
        let call = WeightMatrixCall::new(WeightArgs::Homogeneous { weight: &w }, &clen, &seed, &shape);
        let matrix = dispatcher.weight_matrix(&call).unwrap();
        assert_eq!(matrix.shape(), &[5, 6]);
        let values = matrix.as_i32().unwrap();
        assert!(values.iter().all(|&v| v == 0 || v == 1));
    }
}
