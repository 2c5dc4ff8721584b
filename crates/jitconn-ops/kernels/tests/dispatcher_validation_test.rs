// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Dispatcher Tests
//!
//! Host-array validation (every error names its argument), dtype handling,
//! registry-driven differentiation and device selection.
//!
//! Run with:
//!   cargo test --test dispatcher_validation_test

use jitconn_kernels::{
    ConnParams, CpuBackend, DType, Device, Dispatcher, Error, HostArray, JitMatvec, MatvecCall,
    OperandKind, OperandRef, WeightArgs, WeightMatrixCall, WeightSpec,
};
use ndarray::Array2;

struct Inputs {
    operand: HostArray,
    weight: HostArray,
    clen: HostArray,
    seed: HostArray,
    shape: Vec<usize>,
}

impl Inputs {
    fn dense_f32(shape: (usize, usize)) -> Self {
        Self {
            operand: HostArray::from((0..shape.1).map(|j| j as f32 * 0.5).collect::<Vec<_>>()),
            weight: HostArray::scalar(1.5f32),
            clen: HostArray::scalar(5i32),
            seed: HostArray::scalar(12u32),
            shape: vec![shape.0, shape.1],
        }
    }

    fn call(&self, kind: OperandKind) -> MatvecCall<'_> {
        MatvecCall::new(
            &self.operand,
            kind,
            WeightArgs::Homogeneous {
                weight: &self.weight,
            },
            &self.clen,
            &self.seed,
            &self.shape,
        )
    }
}

fn argument_of(err: &Error) -> Option<&str> {
    match err {
        Error::RankMismatch { argument, .. }
        | Error::NotScalar { argument, .. }
        | Error::DTypeMismatch { argument, .. }
        | Error::InvalidArgument { argument, .. } => Some(argument),
        _ => None,
    }
}

#[test]
fn test_invoke_matches_typed_operator() {
    let dispatcher = Dispatcher::new();
    let inputs = Inputs::dense_f32((6, 10));
    for outdim_parallel in [true, false] {
        let out = dispatcher
            .invoke(&inputs.call(OperandKind::Dense).outdim_parallel(outdim_parallel))
            .unwrap();
        assert_eq!(out.dtype(), DType::F32);
        assert_eq!(out.shape(), &[6]);

        let op = JitMatvec::new(
            WeightSpec::homogeneous(1.5f32),
            ConnParams::new(12, 5).unwrap(),
            (6, 10),
        )
        .unwrap()
        .outdim_parallel(outdim_parallel);
        let v: Vec<f32> = (0..10).map(|j| j as f32 * 0.5).collect();
        let expected = op.apply(&CpuBackend::new(), OperandRef::Dense(&v)).unwrap();
        assert_eq!(out, HostArray::from(expected));
    }
}

#[test]
fn test_transposed_output_length() {
    let dispatcher = Dispatcher::new();
    let mut inputs = Inputs::dense_f32((6, 10));
    inputs.operand = HostArray::from(vec![1.0f32; 6]);
    let out = dispatcher
        .invoke(&inputs.call(OperandKind::Dense).transpose(true))
        .unwrap();
    assert_eq!(out.shape(), &[10]);
}

#[test]
fn test_validation_names_the_argument() {
    let dispatcher = Dispatcher::new();

    let mut inputs = Inputs::dense_f32((3, 4));
    inputs.operand = HostArray::from(Array2::<f32>::zeros((2, 2)));
    let err = dispatcher.invoke(&inputs.call(OperandKind::Dense)).unwrap_err();
    assert_eq!(argument_of(&err), Some("vector"));

    let mut inputs = Inputs::dense_f32((3, 4));
    inputs.weight = HostArray::from(vec![1.0f32, 2.0]);
    let err = dispatcher.invoke(&inputs.call(OperandKind::Dense)).unwrap_err();
    assert!(matches!(err, Error::NotScalar { len: 2, .. }));
    assert_eq!(argument_of(&err), Some("weight"));

    let mut inputs = Inputs::dense_f32((3, 4));
    inputs.weight = HostArray::scalar(1i32);
    let err = dispatcher.invoke(&inputs.call(OperandKind::Dense)).unwrap_err();
    assert_eq!(argument_of(&err), Some("weight"));

    let mut inputs = Inputs::dense_f32((3, 4));
    inputs.seed = HostArray::from(Array2::<i32>::zeros((1, 1)));
    let err = dispatcher.invoke(&inputs.call(OperandKind::Dense)).unwrap_err();
    assert_eq!(argument_of(&err), Some("seed"));

    let mut inputs = Inputs::dense_f32((3, 4));
    inputs.clen = HostArray::scalar(0i64);
    let err = dispatcher.invoke(&inputs.call(OperandKind::Dense)).unwrap_err();
    assert!(matches!(err, Error::InvalidConnLen { clen: 0, .. }));

    let mut inputs = Inputs::dense_f32((3, 4));
    inputs.shape = vec![3, 4, 1];
    let err = dispatcher.invoke(&inputs.call(OperandKind::Dense)).unwrap_err();
    assert_eq!(err, Error::InvalidShape(vec![3, 4, 1]));
}

#[test]
fn test_operand_dtype_must_match_weight_dtype() {
    let dispatcher = Dispatcher::new();
    let mut inputs = Inputs::dense_f32((3, 4));
    inputs.operand = HostArray::from(vec![1.0f64; 4]);
    let err = dispatcher.invoke(&inputs.call(OperandKind::Dense)).unwrap_err();
    assert_eq!(
        err,
        Error::DTypeMismatch {
            argument: "vector".to_string(),
            expected: "float32",
            actual: DType::F64
        }
    );

    let err = dispatcher
        .invoke(&inputs.call(OperandKind::BoolEvents))
        .unwrap_err();
    assert_eq!(argument_of(&err), Some("events"));
}

#[test]
fn test_shape_mismatch_message() {
    let dispatcher = Dispatcher::new();
    let mut inputs = Inputs::dense_f32((3, 4));
    inputs.operand = HostArray::from(vec![1.0f32; 5]);
    let err = dispatcher.invoke(&inputs.call(OperandKind::Dense)).unwrap_err();
    assert_eq!(err.to_string(), "Shape mismatch, mat (3, 4) @ vec (5,).");
    let err = dispatcher
        .invoke(&inputs.call(OperandKind::Dense).transpose(true))
        .unwrap_err();
    assert_eq!(err.to_string(), "Shape mismatch, vec (5,) @ mat (3, 4).");
}

#[test]
fn test_seed_wraps_modulo_two_pow_32() {
    let dispatcher = Dispatcher::new();
    let mut a = Inputs::dense_f32((8, 8));
    a.seed = HostArray::scalar(7i64);
    let mut b = Inputs::dense_f32((8, 8));
    b.seed = HostArray::scalar((1i64 << 32) + 7);
    assert_eq!(
        dispatcher.invoke(&a.call(OperandKind::Dense)).unwrap(),
        dispatcher.invoke(&b.call(OperandKind::Dense)).unwrap()
    );
}

#[test]
fn test_f64_runs_on_cpu_backends() {
    let dispatcher = Dispatcher::new();
    let operand = HostArray::from(vec![true, false, true, true]);
    let low = HostArray::scalar(-1.0f64);
    let high = HostArray::scalar(1.0f64);
    let clen = HostArray::scalar(3u64);
    let seed = HostArray::scalar(5i32);
    let shape = [7, 4];
    let call = MatvecCall::new(
        &operand,
        OperandKind::BoolEvents,
        WeightArgs::Uniform {
            low: &low,
            high: &high,
        },
        &clen,
        &seed,
        &shape,
    );
    for device in [Device::Cpu, Device::Lanes] {
        let out = dispatcher.invoke(&call.on(device)).unwrap();
        assert_eq!(out.dtype(), DType::F64);
        assert_eq!(out.shape(), &[7]);
    }
}

#[test]
fn test_weight_matrix_dtypes() {
    let dispatcher = Dispatcher::new();
    let mu = HostArray::scalar(0.0f32);
    let sigma = HostArray::scalar(1.0f32);
    let clen = HostArray::scalar(2i32);
    let seed = HostArray::scalar(9i32);
    let shape = [5, 3];
    let normal = WeightMatrixCall::new(
        WeightArgs::Normal {
            mu: &mu,
            sigma: &sigma,
        },
        &clen,
        &seed,
        &shape,
    );
    let matrix = dispatcher.weight_matrix(&normal.transpose(true)).unwrap();
    assert_eq!(matrix.dtype(), DType::F32);
    assert_eq!(matrix.shape(), &[5, 3]);

    let weight = HostArray::scalar(4.0f64);
    let homo = WeightMatrixCall::new(WeightArgs::Homogeneous { weight: &weight }, &clen, &seed, &shape)
        .outdim_parallel(false);
    let matrix = dispatcher.weight_matrix(&homo).unwrap();
    assert_eq!(matrix.dtype(), DType::I32);
    assert!(matrix.as_i32().unwrap().iter().any(|&v| v == 1));
}

#[test]
fn test_registry_driven_jvp_and_transpose() {
    let dispatcher = Dispatcher::new();
    let inputs = Inputs::dense_f32((6, 10));
    let call = inputs.call(OperandKind::Dense);

    let tangent = HostArray::from(vec![1.0f32; 10]);
    let jvp = dispatcher.jvp(&call, "vector", &tangent).unwrap();
    assert_eq!(jvp.shape(), &[6]);

    let ct = HostArray::from(vec![1.0f32; 6]);
    let vjp = dispatcher.transpose(&call, "vector", Some(&ct)).unwrap();
    assert_eq!(vjp.shape(), &[10]);
    let zero = dispatcher.transpose(&call, "vector", None).unwrap();
    assert_eq!(zero, HostArray::from(vec![0.0f32; 10]));

    let grad = dispatcher.transpose(&call, "weight", Some(&ct)).unwrap();
    assert_eq!(grad.shape(), &[1]);
    let w_dot = dispatcher.jvp(&call, "weight", &HostArray::scalar(2.0f32)).unwrap();
    assert_eq!(w_dot.shape(), &[6]);

    for argument in ["clen", "seed"] {
        let err = dispatcher.jvp(&call, argument, &tangent).unwrap_err();
        assert_eq!(
            err,
            Error::NotDifferentiable {
                operator: "mv_prob_homo".to_string(),
                argument: argument.to_string()
            }
        );
    }
    let err = dispatcher.jvp(&call, "w_sigma", &tangent).unwrap_err();
    assert_eq!(argument_of(&err), Some("w_sigma"));

    let events = Inputs {
        operand: HostArray::from(vec![true; 10]),
        ..Inputs::dense_f32((6, 10))
    };
    let err = dispatcher
        .transpose(&events.call(OperandKind::BoolEvents), "events", Some(&ct))
        .unwrap_err();
    assert_eq!(err.to_string(), "Cannot differentiate event_mv_prob_homo through events");
}

#[test]
fn test_device_resolution() {
    let inputs = Inputs::dense_f32((4, 4));
    let call = inputs.call(OperandKind::Dense);

    // small f32 work stays on the CPU under Auto
    let dispatcher = Dispatcher::new().with_default_device(Device::Auto);
    assert_eq!(dispatcher.default_device(), Device::Auto);
    let auto = dispatcher.invoke(&call).unwrap();
    let cpu = dispatcher.invoke(&call.on(Device::Cpu)).unwrap();
    assert_eq!(auto, cpu);

    #[cfg(not(feature = "gpu"))]
    assert!(matches!(
        dispatcher.invoke(&call.on(Device::Gpu)),
        Err(Error::DeviceUnavailable(_))
    ));
}

#[test]
fn test_from_config() {
    let mut config = jitconn_config::JitconnConfig::default();
    config.backend.device = "lanes".to_string();
    config.kernel.lane_width = 8;
    let dispatcher = Dispatcher::from_config(&config).unwrap();
    assert_eq!(dispatcher.default_device(), Device::Lanes);
    assert_eq!(dispatcher.registry().len(), 24);

    config.backend.device = "tpu".to_string();
    assert!(matches!(
        Dispatcher::from_config(&config),
        Err(Error::InvalidBackend(_))
    ));
}
