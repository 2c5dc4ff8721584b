// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Differentiation Rule Tests
//!
//! - Finite differences against `jvp_operand` / `jvp_weight`
//! - Dot-product test `⟨ct, A v⟩ == ⟨Aᵀ ct, v⟩` in both layouts
//! - Weight cotangent against finite differences
//! - Rejected arguments are errors, never zeros
//!
//! Run with:
//!   cargo test --test autodiff_rules_test

use jitconn_kernels::{
    Argument, ComputeBackend, ConnParams, CpuBackend, Error, JitMatvec, LaneBackend, OperandKind,
    OperandRef, WeightMode, WeightSpec,
};

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn vector(n: usize, phase: f64) -> Vec<f64> {
    (0..n).map(|j| ((j as f64 + phase) * 0.61).cos()).collect()
}

fn backends() -> Vec<Box<dyn ComputeBackend<f64>>> {
    vec![Box::new(CpuBackend::new()), Box::new(LaneBackend::warp())]
}

fn operators() -> Vec<JitMatvec<f64>> {
    let conn = ConnParams::new(77, 5).unwrap();
    let mut ops = Vec::new();
    for weights in [
        WeightSpec::homogeneous(1.25),
        WeightSpec::uniform(-1.0, 1.0),
        WeightSpec::normal(0.5, 2.0),
    ] {
        for transpose in [false, true] {
            for outdim_parallel in [true, false] {
                ops.push(
                    JitMatvec::new(weights, conn, (27, 44))
                        .unwrap()
                        .transpose(transpose)
                        .outdim_parallel(outdim_parallel),
                );
            }
        }
    }
    ops
}

#[test]
fn test_operand_jvp_matches_finite_differences() {
    let h = 1e-3;
    for backend in backends() {
        for op in operators() {
            let v = vector(op.input_len(), 0.0);
            let t = vector(op.input_len(), 3.0);
            let shifted: Vec<f64> = v.iter().zip(&t).map(|(a, b)| a + h * b).collect();

            let base = op.apply(backend.as_ref(), OperandRef::Dense(&v)).unwrap();
            let moved = op.apply(backend.as_ref(), OperandRef::Dense(&shifted)).unwrap();
            let jvp = op
                .jvp_operand(backend.as_ref(), OperandKind::Dense, &t)
                .unwrap();
            for ((b, m), d) in base.iter().zip(&moved).zip(&jvp) {
                assert!(((m - b) / h - d).abs() < 1e-6, "{} vs {}", (m - b) / h, d);
            }
        }
    }
}

#[test]
fn test_dot_product_identity() {
    for backend in backends() {
        for op in operators() {
            let v = vector(op.input_len(), 1.0);
            let ct = vector(op.output_len(), 5.0);
            let av = op.apply(backend.as_ref(), OperandRef::Dense(&v)).unwrap();
            let at_ct = op
                .transpose_operand(backend.as_ref(), OperandKind::Dense, Some(&ct))
                .unwrap();
            assert_eq!(at_ct.len(), op.input_len());
            let lhs = dot(&ct, &av);
            let rhs = dot(&at_ct, &v);
            assert!(
                (lhs - rhs).abs() < 1e-9 * (1.0 + lhs.abs()),
                "{} {:?}: {lhs} != {rhs}",
                backend.backend_name(),
                op.weights().mode()
            );
        }
    }
}

#[test]
fn test_float_event_operand_transposes_like_dense() {
    let backend = CpuBackend::new();
    let op = operators()[0];
    let ct = vector(op.output_len(), 2.0);
    let dense = op
        .transpose_operand(&backend, OperandKind::Dense, Some(&ct))
        .unwrap();
    let events = op
        .transpose_operand(&backend, OperandKind::FloatEvents, Some(&ct))
        .unwrap();
    assert_eq!(dense, events);
}

#[test]
fn test_weight_jvp_and_cotangent_match_finite_differences() {
    let h = 1e-4;
    let conn = ConnParams::new(31, 3).unwrap();
    for backend in backends() {
        for outdim_parallel in [true, false] {
            let op = JitMatvec::new(WeightSpec::homogeneous(0.8), conn, (33, 21))
                .unwrap()
                .outdim_parallel(outdim_parallel);
            let bumped = op.with_weights(WeightSpec::homogeneous(0.8 + h));
            let v = vector(21, 0.5);
            let ct = vector(33, 4.0);

            let base = op.apply(backend.as_ref(), OperandRef::Dense(&v)).unwrap();
            let moved = bumped.apply(backend.as_ref(), OperandRef::Dense(&v)).unwrap();
            let jvp = op
                .jvp_weight(backend.as_ref(), OperandRef::Dense(&v), 1.0)
                .unwrap();
            for ((b, m), d) in base.iter().zip(&moved).zip(&jvp) {
                assert!(((m - b) / h - d).abs() < 1e-6);
            }

            // d<ct, out>/dw
            let fd = (dot(&ct, &moved) - dot(&ct, &base)) / h;
            let grad = op
                .transpose_weight(backend.as_ref(), OperandRef::Dense(&v), Some(&ct))
                .unwrap();
            assert!((fd - grad).abs() < 1e-5 * (1.0 + fd.abs()), "{fd} vs {grad}");
        }
    }
}

#[test]
fn test_weight_cotangent_with_bool_events() {
    let backend = CpuBackend::new();
    let op = JitMatvec::new(
        WeightSpec::homogeneous(2.0),
        ConnParams::new(6, 4).unwrap(),
        (15, 12),
    )
    .unwrap();
    let events: Vec<bool> = (0..12).map(|j| j % 2 == 1).collect();
    let ct = vector(15, 1.0);
    let out = op.apply(&backend, OperandRef::BoolEvents(&events)).unwrap();
    let grad = op
        .transpose_weight(&backend, OperandRef::BoolEvents(&events), Some(&ct))
        .unwrap();
    // out is linear in w, so <ct, out> / w is the derivative
    assert!((dot(&ct, &out) / 2.0 - grad).abs() < 1e-9);
}

#[test]
fn test_non_differentiable_arguments_error() {
    let backend = CpuBackend::new();
    let op = JitMatvec::new(
        WeightSpec::uniform(0.0, 1.0),
        ConnParams::new(1, 2).unwrap(),
        (4, 4),
    )
    .unwrap();

    let err = op
        .jvp_operand(&backend, OperandKind::BoolEvents, &[1.0; 4])
        .unwrap_err();
    assert_eq!(
        err,
        Error::NotDifferentiable {
            operator: "event_mv_prob_uniform".to_string(),
            argument: "events".to_string()
        }
    );

    let err = op
        .transpose_operand(&backend, OperandKind::BoolEvents, Some(&[1.0; 4]))
        .unwrap_err();
    assert!(matches!(err, Error::NotDifferentiable { .. }));

    for argument in Argument::for_matvec(WeightMode::Uniform).into_iter().skip(1) {
        assert!(matches!(
            op.check_differentiable(OperandKind::Dense, argument),
            Err(Error::NotDifferentiable { .. })
        ));
    }

    // the weight rules need a homogeneous weight
    let err = op
        .jvp_weight(&backend, OperandRef::Dense(&[1.0; 4]), 1.0)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
}

#[test]
fn test_cotangent_shape_is_checked() {
    let backend = CpuBackend::new();
    let op = operators()[0];
    let wrong = vec![1.0; op.output_len() + 1];
    let err = op
        .transpose_operand(&backend, OperandKind::Dense, Some(&wrong))
        .unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch(_)));
}
