// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Differentiation rules of [`JitMatvec`]
//!
//! | argument | JVP | transpose |
//! |---|---|---|
//! | dense vector, float events | operator on the tangent | adjoint on the cotangent |
//! | homogeneous weight | operator with `weight = ẇ` | `Σ operand ⊙ adjointₘ₌₁(ct)` |
//! | bool events, uniform / normal parameters, clen, seed | error | error |
//!
//! Rejections are [`Error::NotDifferentiable`], never silent zeros. A `None`
//! cotangent is a symbolic zero and short-circuits to a zero result.

use jitconn_connectivity::{Error, KernelFloat, Result, WeightMode, WeightSpec};
use serde::{Deserialize, Serialize};

use crate::backend::ComputeBackend;
use crate::operand::{OperandKind, OperandRef};
use crate::operator::JitMatvec;

/// Differentiable-or-not arguments of a matvec operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Argument {
    /// Dense vector or events
    Operand,
    Weight,
    WeightLow,
    WeightHigh,
    WeightMu,
    WeightSigma,
    ConnLen,
    Seed,
}

impl Argument {
    /// Name as used in calls and errors
    pub fn name(&self, operand: OperandKind) -> &'static str {
        match self {
            Argument::Operand => operand.argument_name(),
            Argument::Weight => "weight",
            Argument::WeightLow => "w_low",
            Argument::WeightHigh => "w_high",
            Argument::WeightMu => "w_mu",
            Argument::WeightSigma => "w_sigma",
            Argument::ConnLen => "clen",
            Argument::Seed => "seed",
        }
    }

    /// Parse an argument name (`vector` and `events` both name the operand)
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "vector" | "events" => Ok(Argument::Operand),
            "weight" => Ok(Argument::Weight),
            "w_low" => Ok(Argument::WeightLow),
            "w_high" => Ok(Argument::WeightHigh),
            "w_mu" => Ok(Argument::WeightMu),
            "w_sigma" => Ok(Argument::WeightSigma),
            "clen" => Ok(Argument::ConnLen),
            "seed" => Ok(Argument::Seed),
            other => Err(Error::InvalidArgument {
                argument: other.to_string(),
                reason: "unknown argument name".to_string(),
            }),
        }
    }

    /// Weight parameters of `mode`, in call order
    pub fn weight_parameters(mode: WeightMode) -> &'static [Argument] {
        match mode {
            WeightMode::Homogeneous => &[Argument::Weight],
            WeightMode::Uniform => &[Argument::WeightLow, Argument::WeightHigh],
            WeightMode::Normal => &[Argument::WeightMu, Argument::WeightSigma],
        }
    }

    /// Arguments of a matvec operator in call order
    pub fn for_matvec(mode: WeightMode) -> Vec<Argument> {
        let mut arguments = vec![Argument::Operand];
        arguments.extend_from_slice(Self::weight_parameters(mode));
        arguments.extend([Argument::ConnLen, Argument::Seed]);
        arguments
    }

    fn is_weight_parameter(&self) -> bool {
        matches!(
            self,
            Argument::Weight
                | Argument::WeightLow
                | Argument::WeightHigh
                | Argument::WeightMu
                | Argument::WeightSigma
        )
    }
}

impl<T: KernelFloat> JitMatvec<T> {
    /// Check that the operator can be differentiated through `argument`
    ///
    /// # Errors
    /// - `InvalidArgument` when `argument` is a weight parameter of another mode
    /// - `NotDifferentiable` for bool events, sampled-weight parameters, clen, seed
    pub fn check_differentiable(&self, operand: OperandKind, argument: Argument) -> Result<()> {
        let mode = self.weights().mode();
        if argument.is_weight_parameter() && !Argument::weight_parameters(mode).contains(&argument)
        {
            return Err(Error::InvalidArgument {
                argument: argument.name(operand).to_string(),
                reason: format!("not a parameter of {} operators", mode),
            });
        }

        let differentiable = match argument {
            Argument::Operand => operand != OperandKind::BoolEvents,
            Argument::Weight => true,
            _ => false,
        };
        if differentiable {
            Ok(())
        } else {
            Err(Error::NotDifferentiable {
                operator: self.name(operand),
                argument: argument.name(operand).to_string(),
            })
        }
    }

    /// JVP through the operand: the operator applied to the dense tangent
    pub fn jvp_operand(
        &self,
        backend: &dyn ComputeBackend<T>,
        operand: OperandKind,
        tangent: &[T],
    ) -> Result<Vec<T>> {
        self.check_differentiable(operand, Argument::Operand)?;
        self.apply(backend, OperandRef::Dense(tangent))
    }

    /// JVP through the homogeneous weight: `∂out/∂w · ẇ`
    pub fn jvp_weight(
        &self,
        backend: &dyn ComputeBackend<T>,
        operand: OperandRef<'_, T>,
        weight_tangent: T,
    ) -> Result<Vec<T>> {
        self.check_differentiable(operand.kind(), Argument::Weight)?;
        self.with_weights(WeightSpec::homogeneous(weight_tangent))
            .apply(backend, operand)
    }

    /// Cotangent of the operand: the adjoint applied to `cotangent`
    ///
    /// `None` returns zeros of the operand length without running a kernel.
    pub fn transpose_operand(
        &self,
        backend: &dyn ComputeBackend<T>,
        operand: OperandKind,
        cotangent: Option<&[T]>,
    ) -> Result<Vec<T>> {
        self.check_differentiable(operand, Argument::Operand)?;
        match cotangent {
            None => Ok(vec![T::ZERO; self.input_len()]),
            Some(ct) => self.adjoint().apply(backend, OperandRef::Dense(ct)),
        }
    }

    /// Cotangent of the homogeneous weight: `Σ operand ⊙ adjoint_with_unit_weight(ct)`
    pub fn transpose_weight(
        &self,
        backend: &dyn ComputeBackend<T>,
        operand: OperandRef<'_, T>,
        cotangent: Option<&[T]>,
    ) -> Result<T> {
        self.check_differentiable(operand.kind(), Argument::Weight)?;
        self.check_operand_len(operand.len())?;
        let Some(ct) = cotangent else {
            return Ok(T::ZERO);
        };
        let pulled = self
            .with_weights(WeightSpec::homogeneous(T::ONE))
            .adjoint()
            .apply(backend, OperandRef::Dense(ct))?;
        Ok(operand
            .to_dense()
            .into_iter()
            .zip(pulled)
            .map(|(v, u)| v * u)
            .sum())
    }
}
