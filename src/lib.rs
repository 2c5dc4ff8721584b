//! # jitconn - Just-In-Time Sparse Random Connectivity
//!
//! Matrix-vector products with sparse random matrices that are never stored:
//! every connection and weight is regenerated from `(seed, clen)` while the
//! kernel runs. The same seed always realizes the same matrix.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! jitconn = "0.0.1-beta.18"
//! ```
//!
//! ```rust
//! use jitconn::prelude::*;
//!
//! // 1000 x 1000 matrix, ~10% connectivity, homogeneous weight 1
//! let op = JitcProb::new(0.1, (1000, 1000))?.seed(42);
//! let cpu: &dyn ComputeBackend<f32> = &CpuBackend::new();
//! let out = op.mv_homo(cpu, &vec![1.0f32; 1000], 1.0)?;
//! assert_eq!(out.len(), 1000);
//! # Ok::<(), jitconn::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - **`gpu`**: WGPU backend (Metal / Vulkan / DirectX), `f32` only
//! - **`file-logging`**: per-crate log files in timestamped run folders
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: jitconn-connectivity, jitconn-config       │
//! │  (lfsr88 streams, samplers, errors, TOML config)        │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Algorithms: jitconn-kernels                            │
//! │  (operators, CPU / lane / WGPU backends, autodiff)      │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Dispatch: Dispatcher + OperatorRegistry                │
//! │  (host arrays, validation, device selection)            │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

// Re-export foundation
pub use jitconn_config as config;
pub use jitconn_connectivity as connectivity;

// Re-export algorithms
pub use jitconn_kernels as kernels;

// Re-export infrastructure
pub use jitconn_observability as observability;

pub use jitconn_connectivity::{Error, Result};

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::connectivity::{
        ConnParams, DType, Error, KernelFloat, LanePartition, Layout, Result, WeightMode,
        WeightSpec,
    };

    pub use crate::kernels::{
        ComputeBackend, CpuBackend, Device, Dispatcher, HostArray, JitMatvec, JitcProb,
        LaneBackend, MatvecCall, OperandKind, OperandRef, WeightArgs, WeightMatrixCall,
    };

    #[cfg(feature = "gpu")]
    pub use crate::kernels::WgpuBackend;

    pub use crate::config::{load_config_or_default, JitconnConfig};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::VERSION, super::kernels::VERSION);
    }
}
