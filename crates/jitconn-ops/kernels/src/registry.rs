// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Operator Registry
//!
//! One [`OperatorDescriptor`] per kernel variant: weight mode x operand kind x
//! iteration order for matvec, weight mode x order for materialization. Each
//! descriptor lists its arguments with their differentiation rules and the
//! devices it runs on. The [`Dispatcher`](crate::Dispatcher) owns a registry
//! built once at startup and interprets the rules.

use ahash::AHashMap;
use jitconn_connectivity::{Error, Result, WeightMode};
use serde::{Deserialize, Serialize};

use crate::autodiff::Argument;
use crate::dispatch::Device;
use crate::operand::OperandKind;

/// Operation family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    Matvec { operand: OperandKind },
    WeightMatrix,
}

/// Key of one kernel variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorId {
    pub primitive: Primitive,
    pub mode: WeightMode,
    pub outdim_parallel: bool,
}

impl OperatorId {
    pub fn matvec(operand: OperandKind, mode: WeightMode, outdim_parallel: bool) -> Self {
        Self {
            primitive: Primitive::Matvec { operand },
            mode,
            outdim_parallel,
        }
    }

    pub fn weight_matrix(mode: WeightMode, outdim_parallel: bool) -> Self {
        Self {
            primitive: Primitive::WeightMatrix,
            mode,
            outdim_parallel,
        }
    }

    /// Operator name, e.g. `event_mv_prob_uniform` or `get_homo_weight_matrix`
    pub fn name(&self) -> String {
        match self.primitive {
            Primitive::Matvec { operand } => {
                format!("{}mv_prob_{}", operand.prefix(), self.mode.short_name())
            }
            Primitive::WeightMatrix => format!("get_{}_weight_matrix", self.mode.short_name()),
        }
    }

    /// Kernel variant name including the iteration order
    pub fn variant_name(&self) -> String {
        let order = if self.outdim_parallel {
            "outdim_parallel"
        } else {
            "indim_parallel"
        };
        format!("{}_{}", self.name(), order)
    }

    pub fn operand(&self) -> Option<OperandKind> {
        match self.primitive {
            Primitive::Matvec { operand } => Some(operand),
            Primitive::WeightMatrix => None,
        }
    }
}

/// JVP rule of a differentiable argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JvpRule {
    /// Same operator on the dense tangent
    ApplyToTangent,
    /// Same operator with the weight replaced by its tangent
    SubstituteWeight,
}

/// Transpose (VJP) rule of a differentiable argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransposeRule {
    /// Adjoint operator on the cotangent
    Adjoint,
    /// `Σ operand ⊙ adjoint_with_unit_weight(cotangent)`
    WeightReduction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgumentRule {
    Differentiable {
        jvp: JvpRule,
        transpose: TransposeRule,
    },
    NotDifferentiable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentSpec {
    pub argument: Argument,
    pub name: &'static str,
    pub rule: ArgumentRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorDescriptor {
    pub id: OperatorId,
    pub name: String,
    pub arguments: Vec<ArgumentSpec>,
    pub devices: Vec<Device>,
}

impl OperatorDescriptor {
    /// Standard descriptor for a variant, rules derived from the rule table
    pub fn standard(id: OperatorId) -> Self {
        let arguments = match id.operand() {
            Some(operand) => Argument::for_matvec(id.mode)
                .into_iter()
                .map(|argument| ArgumentSpec {
                    argument,
                    name: argument.name(operand),
                    rule: matvec_rule(id.mode, operand, argument),
                })
                .collect(),
            // materialization has no operand and no gradients
            None => Argument::weight_parameters(id.mode)
                .iter()
                .copied()
                .chain([Argument::ConnLen, Argument::Seed])
                .map(|argument| ArgumentSpec {
                    argument,
                    name: argument.name(OperandKind::Dense),
                    rule: ArgumentRule::NotDifferentiable,
                })
                .collect(),
        };

        Self {
            id,
            name: id.name(),
            arguments,
            devices: vec![Device::Cpu, Device::Lanes, Device::Gpu, Device::Auto],
        }
    }

    /// Look up an argument by name
    pub fn argument(&self, name: &str) -> Result<&ArgumentSpec> {
        self.arguments
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| Error::InvalidArgument {
                argument: name.to_string(),
                reason: format!("{} has no such argument", self.name),
            })
    }

    pub fn supports(&self, device: Device) -> bool {
        self.devices.contains(&device)
    }
}

fn matvec_rule(mode: WeightMode, operand: OperandKind, argument: Argument) -> ArgumentRule {
    match argument {
        Argument::Operand if operand != OperandKind::BoolEvents => ArgumentRule::Differentiable {
            jvp: JvpRule::ApplyToTangent,
            transpose: TransposeRule::Adjoint,
        },
        Argument::Weight if mode == WeightMode::Homogeneous => ArgumentRule::Differentiable {
            jvp: JvpRule::SubstituteWeight,
            transpose: TransposeRule::WeightReduction,
        },
        _ => ArgumentRule::NotDifferentiable,
    }
}

/// Registry of operator descriptors
#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    operators: AHashMap<OperatorId, OperatorDescriptor>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All matvec and materialization variants
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for mode in WeightMode::ALL {
            for outdim_parallel in [true, false] {
                for operand in OperandKind::ALL {
                    registry.register(OperatorDescriptor::standard(OperatorId::matvec(
                        operand,
                        mode,
                        outdim_parallel,
                    )));
                }
                registry.register(OperatorDescriptor::standard(OperatorId::weight_matrix(
                    mode,
                    outdim_parallel,
                )));
            }
        }
        registry
    }

    /// Add or replace a descriptor, returning the replaced one
    pub fn register(&mut self, descriptor: OperatorDescriptor) -> Option<OperatorDescriptor> {
        self.operators.insert(descriptor.id, descriptor)
    }

    pub fn get(&self, id: &OperatorId) -> Result<&OperatorDescriptor> {
        self.operators
            .get(id)
            .ok_or_else(|| Error::UnknownOperator(id.variant_name()))
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperatorDescriptor> {
        self.operators.values()
    }
}
