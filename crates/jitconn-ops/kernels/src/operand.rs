// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Operand kinds: dense vectors, bool events and float events
//!
//! Kernels only ask an operand for `gate(j)`: the value position `j`
//! contributes, or `None` when it contributes nothing. Events are binary, so
//! an active event contributes the connection weight itself.

use jitconn_connectivity::KernelFloat;
use serde::{Deserialize, Serialize};

/// Read access used by the kernels
pub trait Operand<T>: Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Multiplier for position `j`, `None` when the position is skipped
    fn gate(&self, j: usize) -> Option<T>;
}

/// Dense float vector; every position contributes
#[derive(Debug, Clone, Copy)]
pub struct DenseOperand<'a, T>(&'a [T]);

impl<'a, T> DenseOperand<'a, T> {
    pub fn new(values: &'a [T]) -> Self {
        Self(values)
    }
}

impl<T: KernelFloat> Operand<T> for DenseOperand<'_, T> {
    #[inline(always)]
    fn len(&self) -> usize {
        self.0.len()
    }

    #[inline(always)]
    fn gate(&self, j: usize) -> Option<T> {
        Some(self.0[j])
    }
}

/// Spike events as booleans
#[derive(Debug, Clone, Copy)]
pub struct BoolEvents<'a>(&'a [bool]);

impl<'a> BoolEvents<'a> {
    pub fn new(events: &'a [bool]) -> Self {
        Self(events)
    }
}

impl<T: KernelFloat> Operand<T> for BoolEvents<'_> {
    #[inline(always)]
    fn len(&self) -> usize {
        self.0.len()
    }

    #[inline(always)]
    fn gate(&self, j: usize) -> Option<T> {
        self.0[j].then_some(T::ONE)
    }
}

/// Spike events as floats; any nonzero value is an event
#[derive(Debug, Clone, Copy)]
pub struct FloatEvents<'a, T>(&'a [T]);

impl<'a, T> FloatEvents<'a, T> {
    pub fn new(events: &'a [T]) -> Self {
        Self(events)
    }
}

impl<T: KernelFloat> Operand<T> for FloatEvents<'_, T> {
    #[inline(always)]
    fn len(&self) -> usize {
        self.0.len()
    }

    #[inline(always)]
    fn gate(&self, j: usize) -> Option<T> {
        (self.0[j] != T::ZERO).then_some(T::ONE)
    }
}

/// Operand kind tag, part of every operator id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperandKind {
    Dense,
    BoolEvents,
    FloatEvents,
}

impl OperandKind {
    pub const ALL: [OperandKind; 3] = [
        OperandKind::Dense,
        OperandKind::BoolEvents,
        OperandKind::FloatEvents,
    ];

    /// Argument name used in errors (`vector` or `events`)
    pub fn argument_name(&self) -> &'static str {
        match self {
            OperandKind::Dense => "vector",
            OperandKind::BoolEvents | OperandKind::FloatEvents => "events",
        }
    }

    /// Operator name prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            OperandKind::Dense => "",
            OperandKind::BoolEvents => "event_",
            OperandKind::FloatEvents => "float_event_",
        }
    }

    pub fn is_event(&self) -> bool {
        !matches!(self, OperandKind::Dense)
    }
}

impl std::fmt::Display for OperandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperandKind::Dense => write!(f, "dense"),
            OperandKind::BoolEvents => write!(f, "bool_events"),
            OperandKind::FloatEvents => write!(f, "float_events"),
        }
    }
}

/// Borrowed operand of any kind
#[derive(Debug, Clone, Copy)]
pub enum OperandRef<'a, T> {
    Dense(&'a [T]),
    BoolEvents(&'a [bool]),
    FloatEvents(&'a [T]),
}

impl<'a, T: KernelFloat> OperandRef<'a, T> {
    pub fn kind(&self) -> OperandKind {
        match self {
            OperandRef::Dense(_) => OperandKind::Dense,
            OperandRef::BoolEvents(_) => OperandKind::BoolEvents,
            OperandRef::FloatEvents(_) => OperandKind::FloatEvents,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OperandRef::Dense(v) | OperandRef::FloatEvents(v) => v.len(),
            OperandRef::BoolEvents(e) => e.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Effective dense vector (`gate(j)` or zero per position)
    pub fn to_dense(&self) -> Vec<T> {
        match *self {
            OperandRef::Dense(values) => values.to_vec(),
            OperandRef::BoolEvents(events) => events
                .iter()
                .map(|&e| if e { T::ONE } else { T::ZERO })
                .collect(),
            OperandRef::FloatEvents(events) => events
                .iter()
                .map(|&e| if e != T::ZERO { T::ONE } else { T::ZERO })
                .collect(),
        }
    }
}

/// Bind the [`Operand`] matching an [`OperandRef`] and evaluate `$body` with it
#[macro_export]
macro_rules! with_operand {
    ($operand:expr, $op:ident => $body:expr) => {
        match $operand {
            $crate::OperandRef::Dense(values) => {
                let $op = $crate::DenseOperand::new(values);
                $body
            }
            $crate::OperandRef::BoolEvents(events) => {
                let $op = $crate::BoolEvents::new(events);
                $body
            }
            $crate::OperandRef::FloatEvents(events) => {
                let $op = $crate::FloatEvents::new(events);
                $body
            }
        }
    };
}
