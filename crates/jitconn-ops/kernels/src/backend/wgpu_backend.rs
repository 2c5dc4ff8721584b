// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # WGPU Backend
//!
//! Cross-platform GPU backend (Metal/Vulkan/DirectX) running the lane layout:
//! one workgroup of 32 invocations per row / column, see `shaders/jitconn.wgsl`.
//!
//! ## Accumulation
//! - row-parallel: lane partials reduced in lane order in workgroup memory
//! - column-parallel: 64-bit fixed point (`[hi, lo]` u32 atomics, unit 2^-32),
//!   order independent and therefore deterministic. Per-output magnitudes must
//!   stay below 2^31; calls whose bound `max|w| · Σ|v|` reaches it are refused.
//!
//! Buffers are created per invocation; nothing persists between calls.

use jitconn_connectivity::{Error, LanePartition, Layout, Result, WeightSpec, NORMAL_EPSILON};
use ndarray::Array2;
use tracing::{debug, info};

use super::kernel::check_matrix_size;
use super::ComputeBackend;
use crate::operand::OperandRef;
use crate::plan::MatvecPlan;

/// Invocations per workgroup, must match `@workgroup_size` in the shader
const WORKGROUP_LANES: u32 = 32;

/// Per-dimension workgroup limit guaranteed by `wgpu::Limits::default()`
const MAX_WORKGROUPS_PER_DIM: u32 = 65_535;

const FIXED_POINT_SCALE: f64 = 4_294_967_296.0;

/// Exclusive magnitude limit of a decoded accumulator (signed `hi` word)
const FIXED_POINT_LIMIT: f64 = 2_147_483_648.0;

/// Uniform parameters, layout mirrors `Params` in the shader (48 bytes)
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct KernelParams {
    n_out: u32,
    n_in: u32,
    clen: u32,
    seed: u32,
    weight_mode: u32,
    operand_mode: u32,
    dispatch_width: u32,
    group_count: u32,
    w0: f32,
    w1: f32,
    _pad0: u32,
    _pad1: u32,
}

impl KernelParams {
    fn new(plan: &MatvecPlan<f32>, operand_mode: u32) -> Self {
        let (weight_mode, w0, w1) = match plan.weights {
            WeightSpec::Homogeneous { weight } => (0, weight, 0.0),
            WeightSpec::Uniform { low, high } => (1, low, high),
            WeightSpec::Normal { mu, sigma } => (2, mu, sigma),
        };
        let group_count = plan.kernel.group_count(plan.outdim_parallel);
        Self {
            n_out: plan.kernel.out_dim,
            n_in: plan.kernel.in_dim,
            clen: plan.conn.clen(),
            seed: plan.conn.seed(),
            weight_mode,
            operand_mode,
            dispatch_width: group_count.clamp(1, MAX_WORKGROUPS_PER_DIM),
            group_count,
            w0,
            w1,
            _pad0: 0,
            _pad1: 0,
        }
    }

    /// Workgroup grid covering `group_count` groups
    fn grid(&self) -> (u32, u32) {
        let x = self.dispatch_width;
        (x, self.group_count.div_ceil(x))
    }
}

/// Shader entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kernel {
    MatvecRows,
    MatvecCols,
    MaterializeRows,
    MaterializeCols,
}

impl Kernel {
    fn entry_point(&self) -> &'static str {
        match self {
            Kernel::MatvecRows => "matvec_rows",
            Kernel::MatvecCols => "matvec_cols",
            Kernel::MaterializeRows => "materialize_rows",
            Kernel::MaterializeCols => "materialize_cols",
        }
    }
}

struct KernelPipelines {
    matvec_rows: wgpu::ComputePipeline,
    matvec_cols: wgpu::ComputePipeline,
    materialize_rows: wgpu::ComputePipeline,
    materialize_cols: wgpu::ComputePipeline,
}

impl KernelPipelines {
    fn get(&self, kernel: Kernel) -> &wgpu::ComputePipeline {
        match kernel {
            Kernel::MatvecRows => &self.matvec_rows,
            Kernel::MatvecCols => &self.matvec_cols,
            Kernel::MaterializeRows => &self.materialize_rows,
            Kernel::MaterializeCols => &self.materialize_cols,
        }
    }
}

/// Per-invocation GPU buffers
struct KernelBuffers {
    params: wgpu::Buffer,
    operand: wgpu::Buffer,
    out_values: wgpu::Buffer,
    out_fixed: wgpu::Buffer,
}

/// WGPU backend (`f32` only)
pub struct WgpuBackend {
    /// Backend name for logging
    name: String,

    device: wgpu::Device,
    queue: wgpu::Queue,
    bind_group_layout: wgpu::BindGroupLayout,
    pipelines: KernelPipelines,
}

impl WgpuBackend {
    /// Create a new WGPU backend on the high-performance adapter
    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| Error::DeviceUnavailable("no WGPU adapter found".to_string()))?;

        let adapter_info = adapter.get_info();
        let name = format!("WGPU ({} - {:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("JIT Connectivity Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .map_err(|e| Error::Backend(format!("Failed to create device: {}", e)))?;

        let bind_group_layout = Self::create_bind_group_layout(&device);
        let pipelines = Self::create_pipelines(&device, &bind_group_layout);

        info!("✅ {} ready (lane layout x{})", name, WORKGROUP_LANES);

        Ok(Self {
            name,
            device,
            queue,
            bind_group_layout,
            pipelines,
        })
    }

    /// Explicit layout shared by all entry points
    ///
    /// Auto-derived layouts drop bindings an entry point does not use, which
    /// would need one bind group per kernel.
    fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("JIT Connectivity Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, false),
                storage(3, false),
            ],
        })
    }

    fn create_pipelines(
        device: &wgpu::Device,
        bind_group_layout: &wgpu::BindGroupLayout,
    ) -> KernelPipelines {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("JIT Connectivity Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/jitconn.wgsl").into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("JIT Connectivity Pipeline Layout"),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |kernel: Kernel| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(kernel.entry_point()),
                layout: Some(&layout),
                module: &shader,
                entry_point: kernel.entry_point(),
            })
        };

        KernelPipelines {
            matvec_rows: pipeline(Kernel::MatvecRows),
            matvec_cols: pipeline(Kernel::MatvecCols),
            materialize_rows: pipeline(Kernel::MaterializeRows),
            materialize_cols: pipeline(Kernel::MaterializeCols),
        }
    }

    /// Fail early when a buffer exceeds the device binding limit
    fn check_binding_size(&self, label: &str, elements: u64) -> Result<u64> {
        let limits = self.device.limits();
        let max_bytes = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        let bytes = elements.saturating_mul(4).max(4);
        if bytes > max_bytes {
            return Err(Error::Backend(format!(
                "{} buffer needs {} MB, exceeds GPU binding limit ({} MB); use the CPU backend",
                label,
                bytes / (1024 * 1024),
                max_bytes / (1024 * 1024)
            )));
        }
        Ok(bytes)
    }

    fn create_buffers(
        &self,
        params: &KernelParams,
        operand: &[f32],
        out_values_len: u64,
        out_fixed_len: u64,
    ) -> Result<KernelBuffers> {
        let operand_bytes = self.check_binding_size("operand", operand.len() as u64)?;
        let values_bytes = self.check_binding_size("output", out_values_len)?;
        let fixed_bytes = self.check_binding_size("accumulator", out_fixed_len)?;

        let params_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Kernel Params"),
            size: std::mem::size_of::<KernelParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&params_buffer, 0, bytemuck::bytes_of(params));

        let operand_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Operand"),
            size: operand_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if !operand.is_empty() {
            self.queue
                .write_buffer(&operand_buffer, 0, bytemuck::cast_slice(operand));
        }

        // wgpu zero-initializes new buffers
        let out_values = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Output Values"),
            size: values_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let out_fixed = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fixed Point Accumulator"),
            size: fixed_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Ok(KernelBuffers {
            params: params_buffer,
            operand: operand_buffer,
            out_values,
            out_fixed,
        })
    }

    fn dispatch(&self, kernel: Kernel, params: &KernelParams, buffers: &KernelBuffers) {
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("JIT Connectivity Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.operand.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffers.out_values.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: buffers.out_fixed.as_entire_binding(),
                },
            ],
        });

        let (x, y) = params.grid();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(kernel.entry_point()),
            });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.entry_point()),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(self.pipelines.get(kernel));
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(x, y, 1);
        }
        self.queue.submit(Some(encoder.finish()));

        debug!(
            "[WGPU] dispatched {} ({} groups, grid {}x{})",
            kernel.entry_point(),
            params.group_count,
            x,
            y
        );
    }

    /// Copy `len` 32-bit words back to the host (blocking)
    fn download<P: bytemuck::Pod>(&self, buffer: &wgpu::Buffer, len: usize) -> Result<Vec<P>> {
        let size = (len * std::mem::size_of::<P>()) as u64;
        if size == 0 {
            return Ok(Vec::new());
        }

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging_buffer, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| Error::Backend("Failed to receive buffer map result".to_string()))?
            .map_err(|e| Error::Backend(format!("Failed to map readback buffer: {:?}", e)))?;

        let data = buffer_slice.get_mapped_range();
        let values: Vec<P> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging_buffer.unmap();

        Ok(values)
    }
}

/// Operand as `f32` words plus the shader's operand mode
///
/// Bool events become 1.0 / 0.0; float events keep their values and are
/// binarized in the shader.
fn encode_operand(operand: OperandRef<'_, f32>) -> (Vec<f32>, u32) {
    match operand {
        OperandRef::Dense(values) => (values.to_vec(), 0),
        OperandRef::BoolEvents(events) => (
            events.iter().map(|&e| if e { 1.0 } else { 0.0 }).collect(),
            1,
        ),
        OperandRef::FloatEvents(events) => (events.to_vec(), 1),
    }
}

/// Largest `|w|` the sampler can draw
///
/// Normal draws are bounded through the clamped unit draw:
/// `|z| <= sqrt(-2 ln NORMAL_EPSILON)`.
fn weight_bound(weights: &WeightSpec<f32>) -> f64 {
    match *weights {
        WeightSpec::Homogeneous { weight } => (weight as f64).abs(),
        WeightSpec::Uniform { low, high } => (low as f64).abs().max((high as f64).abs()),
        WeightSpec::Normal { mu, sigma } => {
            let tail = (-2.0 * (NORMAL_EPSILON as f64).ln()).sqrt();
            (mu as f64).abs() + (sigma as f64).abs() * tail
        }
    }
}

/// Refuse column-parallel calls that could overflow the accumulators
///
/// Every output receives at most one contribution per input position, so
/// `max|w| · Σ|gate(v)|` bounds each accumulator.
fn check_fixed_point_range(
    weights: &WeightSpec<f32>,
    operand: &[f32],
    operand_mode: u32,
) -> Result<()> {
    let mass: f64 = if operand_mode == 1 {
        operand.iter().filter(|&&v| v != 0.0).count() as f64
    } else {
        operand.iter().map(|&v| (v as f64).abs()).sum()
    };
    let bound = weight_bound(weights) * mass;
    // NaN inputs fail the comparison too
    if bound < FIXED_POINT_LIMIT {
        Ok(())
    } else {
        Err(Error::Backend(format!(
            "column-parallel sums may reach {:.3e}, beyond the 2^31 fixed point range; \
             use outdim_parallel or a CPU backend",
            bound
        )))
    }
}

/// Decode interleaved `[hi, lo]` fixed-point accumulators
fn decode_fixed(words: &[u32]) -> Vec<f32> {
    words
        .chunks_exact(2)
        .map(|pair| {
            let hi = pair[0] as i32 as f64;
            let lo = pair[1] as f64 / FIXED_POINT_SCALE;
            (hi + lo) as f32
        })
        .collect()
}

impl ComputeBackend<f32> for WgpuBackend {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn layout(&self) -> Layout {
        Layout::Lanes(LanePartition::warp())
    }

    fn matvec(&self, plan: &MatvecPlan<f32>, operand: OperandRef<'_, f32>) -> Result<Vec<f32>> {
        let out_dim = plan.kernel.out_dim as usize;
        if out_dim == 0 {
            return Ok(Vec::new());
        }

        let (operand_values, operand_mode) = encode_operand(operand);
        let params = KernelParams::new(plan, operand_mode);
        if params.group_count == 0 {
            return Ok(vec![0.0; out_dim]);
        }

        if plan.outdim_parallel {
            let buffers = self.create_buffers(&params, &operand_values, out_dim as u64, 2)?;
            self.dispatch(Kernel::MatvecRows, &params, &buffers);
            self.download::<f32>(&buffers.out_values, out_dim)
        } else {
            check_fixed_point_range(&plan.weights, &operand_values, operand_mode)?;
            let buffers =
                self.create_buffers(&params, &operand_values, 1, 2 * out_dim as u64)?;
            self.dispatch(Kernel::MatvecCols, &params, &buffers);
            let words = self.download::<u32>(&buffers.out_fixed, 2 * out_dim)?;
            Ok(decode_fixed(&words))
        }
    }

    fn connectivity_matrix(&self, plan: &MatvecPlan<f32>) -> Result<Array2<f32>> {
        let out_dim = plan.kernel.out_dim as usize;
        let in_dim = plan.kernel.in_dim as usize;
        let elements = check_matrix_size::<f32>(out_dim, in_dim)?;
        if elements == 0 {
            return Ok(Array2::zeros((out_dim, in_dim)));
        }

        let params = KernelParams::new(plan, 0);
        let buffers = self.create_buffers(&params, &[], elements as u64, 2)?;
        let kernel = if plan.outdim_parallel {
            Kernel::MaterializeRows
        } else {
            Kernel::MaterializeCols
        };
        self.dispatch(kernel, &params, &buffers);
        let values = self.download::<f32>(&buffers.out_values, elements)?;

        Array2::from_shape_vec((out_dim, in_dim), values)
            .map_err(|e| Error::Backend(format!("Failed to shape weight matrix: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::KernelShape;
    use jitconn_connectivity::ConnParams;

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<KernelParams>(), 48);
    }

    #[test]
    fn test_grid_covers_groups() {
        let plan = MatvecPlan {
            weights: WeightSpec::uniform(0.0f32, 1.0),
            conn: ConnParams::new(1, 3).unwrap(),
            kernel: KernelShape::new(10, 200_000),
            outdim_parallel: false,
        };
        let params = KernelParams::new(&plan, 0);
        assert_eq!(params.group_count, 200_000);
        let (x, y) = params.grid();
        assert_eq!(x, MAX_WORKGROUPS_PER_DIM);
        assert!(x as u64 * y as u64 >= 200_000);
        assert_eq!((params.weight_mode, params.w0, params.w1), (1, 0.0, 1.0));
    }

    #[test]
    fn test_decode_fixed() {
        let half = (FIXED_POINT_SCALE / 2.0) as u32;
        let words = [3u32, half, (-2i32) as u32, half, 0, 0];
        assert_eq!(decode_fixed(&words), vec![3.5, -1.5, 0.0]);
    }

    /// Host mirror of `fixed_add` in the shader
    fn encode_fixed(value: f32) -> (u32, u32) {
        let magnitude = value.abs();
        let mut hi = magnitude.floor() as u32;
        let mut lo = (magnitude.fract() * 4_294_967_296.0f32).round() as u32;
        if value < 0.0 {
            hi = (!hi).wrapping_add(u32::from(lo == 0));
            lo = (!lo).wrapping_add(1);
        }
        (hi, lo)
    }

    fn accumulate(values: &[f32]) -> f32 {
        let (mut hi, mut lo) = (0u32, 0u32);
        for &v in values {
            let (h, l) = encode_fixed(v);
            let (sum, carry) = lo.overflowing_add(l);
            lo = sum;
            hi = hi.wrapping_add(h).wrapping_add(u32::from(carry));
        }
        decode_fixed(&[hi, lo])[0]
    }

    #[test]
    fn test_fixed_point_small_and_negative_contributions() {
        assert_eq!(accumulate(&[-1.0]), -1.0);
        assert_eq!(accumulate(&[-2.75, 1.5]), -1.25);
        assert_eq!(accumulate(&[0.25, -0.25]), 0.0);

        // One unit is 2^-32, far below the f32 resolution around 1.0
        let tiny = accumulate(&[-1e-6; 500]);
        assert!((tiny - (-5e-4)).abs() < 1e-8, "{tiny}");
        let small = accumulate(&[-1e-9, 3e-9, -2e-9]);
        assert!(small.abs() < 1e-9, "{small}");
        let mixed = accumulate(&[1e-4, -3e-4, 2.5e-5]);
        assert!((mixed - (-1.75e-4)).abs() < 1e-9, "{mixed}");
    }

    #[test]
    fn test_fixed_point_range_check() {
        let dense = [1.0f32, -3.0, 0.0];
        assert_eq!(weight_bound(&WeightSpec::homogeneous(-2.0)), 2.0);
        assert_eq!(weight_bound(&WeightSpec::uniform(-4.0, 1.0)), 4.0);
        assert!(weight_bound(&WeightSpec::normal(1.0, 1.0)) > 7.0);

        assert!(check_fixed_point_range(&WeightSpec::homogeneous(-2.0), &dense, 0).is_ok());
        let huge = WeightSpec::homogeneous(1.0e9f32);
        assert!(check_fixed_point_range(&huge, &dense, 1).is_ok());
        assert!(check_fixed_point_range(&huge, &dense, 0).is_err());
        assert!(check_fixed_point_range(&WeightSpec::homogeneous(f32::NAN), &dense, 0).is_err());
    }

    #[test]
    fn test_encode_operand() {
        let events = [true, false];
        assert_eq!(encode_operand(OperandRef::BoolEvents(&events)), (vec![1.0, 0.0], 1));
        let dense = [0.5f32];
        assert_eq!(encode_operand(OperandRef::Dense(&dense)), (vec![0.5], 0));
    }

    #[test]
    fn test_wgpu_backend_creation() {
        match WgpuBackend::new() {
            Ok(backend) => assert!(backend.backend_name().starts_with("WGPU")),
            Err(e) => eprintln!("WGPU not available, skipping: {}", e),
        }
    }
}
