// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Dynamically typed host arrays accepted by the [`Dispatcher`](crate::Dispatcher)

use std::borrow::Cow;

use jitconn_connectivity::{DType, KernelFloat};
use ndarray::{Array1, Array2, ArrayD};

/// N-dimensional host array of one of the supported element types
#[derive(Debug, Clone, PartialEq)]
pub enum HostArray {
    Bool(ArrayD<bool>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    U32(ArrayD<u32>),
    U64(ArrayD<u64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

macro_rules! for_each_variant {
    ($self:expr, $a:ident => $body:expr) => {
        match $self {
            HostArray::Bool($a) => $body,
            HostArray::I32($a) => $body,
            HostArray::I64($a) => $body,
            HostArray::U32($a) => $body,
            HostArray::U64($a) => $body,
            HostArray::F32($a) => $body,
            HostArray::F64($a) => $body,
        }
    };
}

impl HostArray {
    pub fn dtype(&self) -> DType {
        match self {
            HostArray::Bool(_) => DType::Bool,
            HostArray::I32(_) => DType::I32,
            HostArray::I64(_) => DType::I64,
            HostArray::U32(_) => DType::U32,
            HostArray::U64(_) => DType::U64,
            HostArray::F32(_) => DType::F32,
            HostArray::F64(_) => DType::F64,
        }
    }

    pub fn ndim(&self) -> usize {
        for_each_variant!(self, a => a.ndim())
    }

    pub fn shape(&self) -> &[usize] {
        for_each_variant!(self, a => a.shape())
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        for_each_variant!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First element of an integer array, widened
    pub fn first_integer(&self) -> Option<i128> {
        match self {
            HostArray::I32(a) => a.iter().next().map(|&v| v as i128),
            HostArray::I64(a) => a.iter().next().map(|&v| v as i128),
            HostArray::U32(a) => a.iter().next().map(|&v| v as i128),
            HostArray::U64(a) => a.iter().next().map(|&v| v as i128),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&ArrayD<bool>> {
        match self {
            HostArray::Bool(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&ArrayD<i32>> {
        match self {
            HostArray::I32(a) => Some(a),
            _ => None,
        }
    }

    /// Single-element `[1]` array
    pub fn scalar<T>(value: T) -> Self
    where
        Self: From<Vec<T>>,
    {
        Self::from(vec![value])
    }
}

macro_rules! impl_from {
    ($ty:ty, $variant:ident) => {
        impl From<ArrayD<$ty>> for HostArray {
            fn from(array: ArrayD<$ty>) -> Self {
                HostArray::$variant(array)
            }
        }

        impl From<Array1<$ty>> for HostArray {
            fn from(array: Array1<$ty>) -> Self {
                HostArray::$variant(array.into_dyn())
            }
        }

        impl From<Array2<$ty>> for HostArray {
            fn from(array: Array2<$ty>) -> Self {
                HostArray::$variant(array.into_dyn())
            }
        }

        impl From<Vec<$ty>> for HostArray {
            fn from(values: Vec<$ty>) -> Self {
                HostArray::$variant(Array1::from(values).into_dyn())
            }
        }
    };
}

impl_from!(bool, Bool);
impl_from!(i32, I32);
impl_from!(i64, I64);
impl_from!(u32, U32);
impl_from!(u64, U64);
impl_from!(f32, F32);
impl_from!(f64, F64);

/// Float element types that round-trip through [`HostArray`]
pub trait HostFloat: KernelFloat {
    fn view(array: &HostArray) -> Option<&ArrayD<Self>>;

    fn into_host(values: ArrayD<Self>) -> HostArray;
}

impl HostFloat for f32 {
    fn view(array: &HostArray) -> Option<&ArrayD<f32>> {
        match array {
            HostArray::F32(a) => Some(a),
            _ => None,
        }
    }

    fn into_host(values: ArrayD<f32>) -> HostArray {
        HostArray::F32(values)
    }
}

impl HostFloat for f64 {
    fn view(array: &HostArray) -> Option<&ArrayD<f64>> {
        match array {
            HostArray::F64(a) => Some(a),
            _ => None,
        }
    }

    fn into_host(values: ArrayD<f64>) -> HostArray {
        HostArray::F64(values)
    }
}

/// Elements in logical order, borrowed when the layout is standard
pub(crate) fn contiguous<T: Clone>(array: &ArrayD<T>) -> Cow<'_, [T]> {
    match array.as_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(array.iter().cloned().collect()),
    }
}

/// Rank-1 host array from a vector
pub(crate) fn vector_into_host<T: HostFloat>(values: Vec<T>) -> HostArray {
    T::into_host(Array1::from(values).into_dyn())
}
