// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Compute Backend Abstraction
//!
//! Provides a unified interface for the devices that run the JIT kernels:
//! - **CPU**: serial layout, one stream per row / column, rayon parallel
//! - **Lanes**: lane layout emulated on the CPU (reference for the shader)
//! - **WGPU**: lane layout on the GPU (`f32`, feature `gpu`)
//!
//! Operators never talk to a device directly; they build a
//! [`MatvecPlan`](crate::MatvecPlan) and hand it to a [`ComputeBackend`].

mod cpu;
pub(crate) mod kernel;
mod lane;
#[cfg(feature = "gpu")]
mod wgpu_backend;

pub use cpu::{CpuBackend, DEFAULT_COLUMN_CHUNK};
pub use lane::LaneBackend;
#[cfg(feature = "gpu")]
pub use wgpu_backend::WgpuBackend;

use jitconn_connectivity::{DType, Error, KernelFloat, Layout, Result};
use ndarray::Array2;
use tracing::info;

use crate::operand::OperandRef;
use crate::plan::MatvecPlan;

/// Compute backend trait (CPU, lane emulation, GPU)
///
/// Generic over the value type `T`; object safe so dispatch code can hold a
/// `&dyn ComputeBackend<T>`.
pub trait ComputeBackend<T: KernelFloat>: Send + Sync {
    /// Get backend name for logging/debugging
    fn backend_name(&self) -> &str;

    /// Connectivity layout this backend generates
    ///
    /// Backends with the same layout realize the same random matrix.
    fn layout(&self) -> Layout;

    /// Run one matvec kernel
    ///
    /// Returns a vector of length `plan.kernel.out_dim`. The caller has
    /// already checked `operand.len() == plan.kernel.in_dim`.
    fn matvec(&self, plan: &MatvecPlan<T>, operand: OperandRef<'_, T>) -> Result<Vec<T>>;

    /// Materialize the kernel-orientation matrix `(out_dim, in_dim)`
    ///
    /// Same generator, layout and draw order as [`ComputeBackend::matvec`].
    fn connectivity_matrix(&self, plan: &MatvecPlan<T>) -> Result<Array2<T>>;
}

/// Backend type enum for construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// CPU, serial layout
    Cpu,

    /// CPU emulation of the GPU lane layout
    Lanes,

    /// GPU via WGPU (Metal/Vulkan/DirectX - cross-platform)
    #[cfg(feature = "gpu")]
    Wgpu,

    /// Auto-select based on problem size and hardware availability
    #[default]
    Auto,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Cpu => write!(f, "CPU"),
            BackendType::Lanes => write!(f, "Lanes"),
            #[cfg(feature = "gpu")]
            BackendType::Wgpu => write!(f, "WGPU"),
            BackendType::Auto => write!(f, "Auto"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(BackendType::Cpu),
            "lanes" => Ok(BackendType::Lanes),
            #[cfg(feature = "gpu")]
            "wgpu" | "gpu" => Ok(BackendType::Wgpu),
            "auto" => Ok(BackendType::Auto),
            _ => Err(Error::InvalidBackend(s.to_string())),
        }
    }
}

/// Configuration for backend auto-selection
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Minimum expected connections to consider the GPU (default: 4,000,000)
    pub gpu_element_threshold: usize,

    /// Force CPU even if GPU would be beneficial
    pub force_cpu: bool,

    /// Force GPU even if CPU would be better (for testing)
    pub force_gpu: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            // below a few million connections upload + readback dominate
            gpu_element_threshold: 4_000_000,
            force_cpu: false,
            force_gpu: false,
        }
    }
}

impl From<&jitconn_config::BackendSettings> for BackendConfig {
    fn from(settings: &jitconn_config::BackendSettings) -> Self {
        Self {
            gpu_element_threshold: settings.gpu_element_threshold,
            force_cpu: settings.force_cpu,
            force_gpu: settings.force_gpu,
        }
    }
}

/// Backend selection decision with rationale
#[derive(Debug, Clone)]
pub struct BackendDecision {
    pub backend_type: BackendType,
    pub reason: String,
    pub estimated_speedup: f32,
}

/// Auto-select a backend for one invocation
///
/// Selection priority:
/// 1. Honor force flags (`force_cpu`, `force_gpu`)
/// 2. GPU for `f32` work above `gpu_element_threshold` when an adapter exists
/// 3. Fall back to CPU - always available
pub fn select_backend(
    expected_connections: usize,
    dtype: DType,
    config: &BackendConfig,
) -> BackendDecision {
    if config.force_cpu {
        return BackendDecision {
            backend_type: BackendType::Cpu,
            reason: "Forced CPU via configuration".to_string(),
            estimated_speedup: 1.0,
        };
    }

    #[cfg(feature = "gpu")]
    if config.force_gpu {
        if dtype != DType::F32 {
            info!("⚠️  GPU forced but {} is not supported there, falling back to CPU", dtype);
            return BackendDecision {
                backend_type: BackendType::Cpu,
                reason: format!("GPU forced but {} is CPU only", dtype),
                estimated_speedup: 1.0,
            };
        }
        if is_gpu_available() {
            return BackendDecision {
                backend_type: BackendType::Wgpu,
                reason: "Forced WGPU via configuration".to_string(),
                estimated_speedup: estimate_gpu_speedup(expected_connections),
            };
        }
        info!("⚠️  WGPU forced but not available, falling back to CPU");
        return BackendDecision {
            backend_type: BackendType::Cpu,
            reason: "WGPU forced but not available, falling back to CPU".to_string(),
            estimated_speedup: 1.0,
        };
    }

    let _meets_gpu_threshold = expected_connections >= config.gpu_element_threshold;

    #[cfg(feature = "gpu")]
    if _meets_gpu_threshold && dtype == DType::F32 && is_gpu_available() {
        let speedup = estimate_gpu_speedup(expected_connections);
        if speedup > 1.5 {
            return BackendDecision {
                backend_type: BackendType::Wgpu,
                reason: format!(
                    "WGPU selected: ~{} connections (cross-platform GPU)",
                    expected_connections
                ),
                estimated_speedup: speedup,
            };
        }
    }

    BackendDecision {
        backend_type: BackendType::Cpu,
        reason: format!(
            "CPU selected: ~{} connections, {} (below GPU threshold or GPU not available)",
            expected_connections, dtype
        ),
        estimated_speedup: 1.0,
    }
}

/// Check if a GPU adapter is available
#[cfg(feature = "gpu")]
pub fn is_gpu_available() -> bool {
    use wgpu::Backends;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: Backends::all(),
        ..Default::default()
    });

    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .is_some()
}

/// Check if a GPU adapter is available (always `false` without `gpu`)
#[cfg(not(feature = "gpu"))]
pub fn is_gpu_available() -> bool {
    false
}

/// Estimate GPU speedup from the number of generated connections
#[cfg(feature = "gpu")]
fn estimate_gpu_speedup(expected_connections: usize) -> f32 {
    // Per connection the CPU spends ~10 ops (key advance, modulo, weight, add).
    // The GPU pays a fixed ~300 us for upload, dispatch and readback.
    let connections = expected_connections as f32;
    let cpu_us = connections * 10.0 / 100_000.0; // ~100 GFLOPS effective
    let gpu_us = connections * 10.0 / 5_000_000.0 + 300.0;
    (cpu_us / gpu_us).clamp(0.1, 100.0)
}

/// Create a backend of a concrete type for `f32` values
///
/// `BackendType::Auto` resolves through [`select_backend`] first.
pub fn create_backend(
    backend_type: BackendType,
    expected_connections: usize,
    config: &BackendConfig,
) -> Result<Box<dyn ComputeBackend<f32>>> {
    let resolved = match backend_type {
        BackendType::Auto => {
            let decision = select_backend(expected_connections, DType::F32, config);
            info!(
                "🎯 Backend auto-selection: {} ({})",
                decision.backend_type, decision.reason
            );
            decision.backend_type
        }
        other => other,
    };

    match resolved {
        BackendType::Cpu | BackendType::Auto => {
            info!("🖥️  Using CPU backend (serial layout)");
            Ok(Box::new(CpuBackend::new()))
        }
        BackendType::Lanes => {
            info!("🖥️  Using CPU lane backend");
            Ok(Box::new(LaneBackend::warp()))
        }
        #[cfg(feature = "gpu")]
        BackendType::Wgpu => {
            info!("🎮 Using WGPU backend");
            Ok(Box::new(WgpuBackend::new()?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_parse() {
        assert_eq!("CPU".parse::<BackendType>().unwrap(), BackendType::Cpu);
        assert_eq!("lanes".parse::<BackendType>().unwrap(), BackendType::Lanes);
        assert_eq!("auto".parse::<BackendType>().unwrap(), BackendType::Auto);
        assert!(matches!(
            "tpu".parse::<BackendType>(),
            Err(Error::InvalidBackend(_))
        ));
        assert_eq!(BackendType::default(), BackendType::Auto);
    }

    #[test]
    fn test_force_cpu_wins() {
        let config = BackendConfig {
            force_cpu: true,
            force_gpu: true,
            ..Default::default()
        };
        let decision = select_backend(usize::MAX, DType::F32, &config);
        assert_eq!(decision.backend_type, BackendType::Cpu);
        assert_eq!(decision.estimated_speedup, 1.0);
    }

    #[test]
    fn test_small_problems_stay_on_cpu() {
        let decision = select_backend(1_000, DType::F32, &BackendConfig::default());
        assert_eq!(decision.backend_type, BackendType::Cpu);
        assert!(decision.reason.contains("CPU selected"));
    }

    #[test]
    fn test_f64_never_selects_gpu() {
        let config = BackendConfig {
            gpu_element_threshold: 0,
            ..Default::default()
        };
        let decision = select_backend(usize::MAX, DType::F64, &config);
        assert_eq!(decision.backend_type, BackendType::Cpu);
    }

    #[test]
    fn test_config_conversion() {
        let settings = jitconn_config::BackendSettings {
            gpu_element_threshold: 7,
            force_cpu: true,
            ..Default::default()
        };
        let config = BackendConfig::from(&settings);
        assert_eq!(config.gpu_element_threshold, 7);
        assert!(config.force_cpu);
        assert!(!config.force_gpu);
    }

    #[test]
    fn test_create_cpu_backend() {
        let backend = create_backend(BackendType::Cpu, 0, &BackendConfig::default()).unwrap();
        assert_eq!(backend.layout(), Layout::Serial);
        let backend = create_backend(BackendType::Lanes, 0, &BackendConfig::default()).unwrap();
        assert!(matches!(backend.layout(), Layout::Lanes(_)));
    }
}
