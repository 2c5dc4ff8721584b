// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # lfsr88 Key Streams
//!
//! L'Ecuyer's combined Tausworthe generator (lfsr88) with a four-word state.
//! Every connectivity stream owns one key; there is no shared generator.
//!
//! The same recurrence is implemented in `jitconn.wgsl`. Any change here must
//! be mirrored there, otherwise GPU and CPU connectivity diverge.

use serde::{Deserialize, Serialize};

/// `2^-32` as used by the unit-interval conversion (`f32(word) * UNIT_SCALE`)
pub const UNIT_SCALE: f32 = 2.328_306_4e-10;

/// Lower clamp applied to the first Box-Muller uniform
pub const NORMAL_EPSILON: f32 = 1e-10;

/// lfsr88 generator state
///
/// `Lfsr88Key::new(seed)` is a pure function of `seed`; two keys built from
/// the same seed produce the same sequence of draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lfsr88Key {
    z1: u32,
    z2: u32,
    z3: u32,
    last: u32,
}

impl Lfsr88Key {
    /// Initialize a key from a 32-bit seed (wrapping offsets 1, 7 and 15)
    #[inline]
    pub fn new(seed: u32) -> Self {
        Self {
            z1: seed.wrapping_add(1),
            z2: seed.wrapping_add(7),
            z3: seed.wrapping_add(15),
            last: 0,
        }
    }

    /// Raw state words `[z1, z2, z3, b]`
    pub fn state(&self) -> [u32; 4] {
        [self.z1, self.z2, self.z3, self.last]
    }

    /// Advance the three component generators and return the mixed word
    #[inline(always)]
    pub fn next_u32(&mut self) -> u32 {
        let mut b = ((self.z1 << 13) ^ self.z1) >> 19;
        self.z1 = ((self.z1 & 0xFFFF_FFFE) << 12) ^ b;
        b = ((self.z2 << 2) ^ self.z2) >> 25;
        self.z2 = ((self.z2 & 0xFFFF_FFF8) << 4) ^ b;
        b = ((self.z3 << 3) ^ self.z3) >> 11;
        self.z3 = ((self.z3 & 0xFFFF_FFF0) << 17) ^ b;
        self.last = b;
        self.z1 ^ self.z2 ^ self.z3
    }

    /// Uniform integer in `[low, high]` (inclusive)
    ///
    /// Callers guarantee `low <= high`; the span `high - low + 1` only wraps
    /// to zero for the full `u32` range, in which case the raw word is used.
    #[inline(always)]
    pub fn uniform_int(&mut self, low: u32, high: u32) -> u32 {
        debug_assert!(low <= high, "uniform_int: empty range [{low}, {high}]");
        let span = high.wrapping_sub(low).wrapping_add(1);
        let word = self.next_u32();
        if span == 0 {
            word
        } else {
            word % span + low
        }
    }

    /// Uniform float in `[0, 1)` (up to `f32` rounding of the top word)
    #[inline(always)]
    pub fn unit(&mut self) -> f32 {
        self.next_u32() as f32 * UNIT_SCALE
    }

    /// Uniform float in `[low, high)`
    #[inline(always)]
    pub fn uniform(&mut self, low: f32, high: f32) -> f32 {
        self.unit() * (high - low) + low
    }

    /// Standard normal draw (Box-Muller, cosine branch, two unit draws)
    #[inline]
    pub fn standard_normal(&mut self) -> f32 {
        let u1 = self.unit().max(NORMAL_EPSILON);
        let u2 = self.unit();
        (-2.0 * u1.ln()).sqrt() * (core::f32::consts::TAU * u2).cos()
    }

    /// Normal draw with mean `mu` and standard deviation `sigma`
    #[inline]
    pub fn normal(&mut self, mu: f32, sigma: f32) -> f32 {
        mu + sigma * self.standard_normal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_initialization() {
        let key = Lfsr88Key::new(0);
        assert_eq!(key.state(), [1, 7, 15, 0]);

        let wrapped = Lfsr88Key::new(u32::MAX);
        assert_eq!(wrapped.state(), [0, 6, 14, 0]);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Lfsr88Key::new(123);
        let mut b = Lfsr88Key::new(123);
        for _ in 0..1000 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = Lfsr88Key::new(2);
        let mut b = Lfsr88Key::new(3);
        let same = (0..64).filter(|_| a.next_u32() == b.next_u32()).count();
        assert!(same < 4, "streams for neighbouring seeds should not coincide");
    }

    #[test]
    fn test_masked_low_bits_collapse_odd_seed_with_successor() {
        // seed 1 -> (2, 8, 16), seed 2 -> (3, 9, 17): only masked bits differ
        let mut a = Lfsr88Key::new(1);
        let mut b = Lfsr88Key::new(2);
        for _ in 0..32 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_uniform_int_bounds() {
        let mut key = Lfsr88Key::new(42);
        for _ in 0..10_000 {
            let v = key.uniform_int(3, 9);
            assert!((3..=9).contains(&v));
        }
        for _ in 0..100 {
            assert_eq!(key.uniform_int(5, 5), 5);
        }
    }

    #[test]
    fn test_uniform_int_covers_range() {
        let mut key = Lfsr88Key::new(7);
        let mut seen = [false; 10];
        for _ in 0..2_000 {
            seen[key.uniform_int(0, 9) as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_uniform_float_range_and_mean() {
        let mut key = Lfsr88Key::new(2024);
        let n = 20_000;
        let mut sum = 0.0f64;
        for _ in 0..n {
            let v = key.uniform(-2.0, 6.0);
            assert!((-2.0..=6.0).contains(&v));
            sum += v as f64;
        }
        let mean = sum / n as f64;
        assert!((mean - 2.0).abs() < 0.1, "mean {mean}");
    }

    #[test]
    fn test_normal_moments() {
        let mut key = Lfsr88Key::new(99);
        let n = 40_000;
        let draws: Vec<f64> = (0..n).map(|_| key.normal(1.5, 0.5) as f64).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 1.5).abs() < 0.02, "mean {mean}");
        assert!((var.sqrt() - 0.5).abs() < 0.02, "std {}", var.sqrt());
    }

    #[test]
    fn test_normal_consumes_two_words() {
        let mut a = Lfsr88Key::new(5);
        let mut b = Lfsr88Key::new(5);
        let _ = a.standard_normal();
        b.next_u32();
        b.next_u32();
        assert_eq!(a, b);
    }
}
