// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Floating-point value types accepted by the kernels

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul, Neg, Sub};

use super::dtype::DType;

/// Value type of weights, operands and outputs (`f32` or `f64`)
///
/// Unit draws come out of the key as `f32`; `from_f32` maps them into `Self`.
pub trait KernelFloat:
    Copy
    + Clone
    + Send
    + Sync
    + fmt::Debug
    + fmt::Display
    + Default
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + AddAssign
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
    + Sum
    + 'static
{
    const ZERO: Self;
    const ONE: Self;
    const DTYPE: DType;

    fn from_f32(value: f32) -> Self;
}

impl KernelFloat for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const DTYPE: DType = DType::F32;

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        value
    }
}

impl KernelFloat for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const DTYPE: DType = DType::F64;

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        value as f64
    }
}
