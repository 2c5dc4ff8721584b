// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-connection weight samplers
//!
//! Homogeneous weights consume nothing from the key. Uniform draws consume one
//! word, normal draws two; unit draws are produced in `f32` and mapped into
//! the value type afterwards, so `f32` and `f64` operators share connectivity.

use serde::{Deserialize, Serialize};

use crate::prng::Lfsr88Key;
use crate::types::KernelFloat;

/// Strategy drawing the weight of one generated connection
pub trait WeightSampler: Copy + Send + Sync {
    type Weight: Copy + Send + Sync;

    /// Draw the weight for the connection at the key's current position
    fn draw(&self, key: &mut Lfsr88Key) -> Self::Weight;

    /// Key words consumed per connection (0, 1 or 2)
    fn words_per_draw(&self) -> u32;
}

/// Same weight for every connection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomogeneousSampler<T> {
    weight: T,
}

impl<T: KernelFloat> HomogeneousSampler<T> {
    pub fn new(weight: T) -> Self {
        Self { weight }
    }
}

impl<T: KernelFloat> WeightSampler for HomogeneousSampler<T> {
    type Weight = T;

    #[inline(always)]
    fn draw(&self, _key: &mut Lfsr88Key) -> T {
        self.weight
    }

    fn words_per_draw(&self) -> u32 {
        0
    }
}

/// Weight drawn from `U[low, high)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformSampler<T> {
    low: T,
    span: T,
}

impl<T: KernelFloat> UniformSampler<T> {
    pub fn new(low: T, high: T) -> Self {
        Self {
            low,
            span: high - low,
        }
    }
}

impl<T: KernelFloat> WeightSampler for UniformSampler<T> {
    type Weight = T;

    #[inline(always)]
    fn draw(&self, key: &mut Lfsr88Key) -> T {
        T::from_f32(key.unit()) * self.span + self.low
    }

    fn words_per_draw(&self) -> u32 {
        1
    }
}

/// Weight drawn from `N(mu, sigma^2)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalSampler<T> {
    mu: T,
    sigma: T,
}

impl<T: KernelFloat> NormalSampler<T> {
    pub fn new(mu: T, sigma: T) -> Self {
        Self { mu, sigma }
    }
}

impl<T: KernelFloat> WeightSampler for NormalSampler<T> {
    type Weight = T;

    #[inline(always)]
    fn draw(&self, key: &mut Lfsr88Key) -> T {
        self.mu + self.sigma * T::from_f32(key.standard_normal())
    }

    fn words_per_draw(&self) -> u32 {
        2
    }
}

/// Weight distribution family of an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightMode {
    Homogeneous,
    Uniform,
    Normal,
}

impl WeightMode {
    pub const ALL: [WeightMode; 3] = [WeightMode::Homogeneous, WeightMode::Uniform, WeightMode::Normal];

    /// Short name used in operator names (`homo`, `uniform`, `normal`)
    pub fn short_name(&self) -> &'static str {
        match self {
            WeightMode::Homogeneous => "homo",
            WeightMode::Uniform => "uniform",
            WeightMode::Normal => "normal",
        }
    }
}

impl std::fmt::Display for WeightMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

impl std::str::FromStr for WeightMode {
    type Err = crate::types::Error;

    fn from_str(s: &str) -> crate::types::Result<Self> {
        match s.to_lowercase().as_str() {
            "homo" | "homogeneous" => Ok(WeightMode::Homogeneous),
            "uniform" => Ok(WeightMode::Uniform),
            "normal" => Ok(WeightMode::Normal),
            other => Err(crate::types::Error::InvalidArgument {
                argument: "weight_mode".to_string(),
                reason: format!("unknown weight mode '{other}'"),
            }),
        }
    }
}

/// Weight parameters of an operator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeightSpec<T> {
    Homogeneous { weight: T },
    Uniform { low: T, high: T },
    Normal { mu: T, sigma: T },
}

impl<T: KernelFloat> WeightSpec<T> {
    pub fn homogeneous(weight: T) -> Self {
        WeightSpec::Homogeneous { weight }
    }

    pub fn uniform(low: T, high: T) -> Self {
        WeightSpec::Uniform { low, high }
    }

    pub fn normal(mu: T, sigma: T) -> Self {
        WeightSpec::Normal { mu, sigma }
    }

    pub fn mode(&self) -> WeightMode {
        match self {
            WeightSpec::Homogeneous { .. } => WeightMode::Homogeneous,
            WeightSpec::Uniform { .. } => WeightMode::Uniform,
            WeightSpec::Normal { .. } => WeightMode::Normal,
        }
    }

    /// Parameters in call order (one for homogeneous, two otherwise)
    pub fn parameters(&self) -> Vec<T> {
        match *self {
            WeightSpec::Homogeneous { weight } => vec![weight],
            WeightSpec::Uniform { low, high } => vec![low, high],
            WeightSpec::Normal { mu, sigma } => vec![mu, sigma],
        }
    }
}

/// Bind the sampler matching a [`WeightSpec`] and evaluate `$body` with it
///
/// Expands to one monomorphized body per weight mode.
#[macro_export]
macro_rules! with_sampler {
    ($spec:expr, $sampler:ident => $body:expr) => {
        match $spec {
            $crate::WeightSpec::Homogeneous { weight } => {
                let $sampler = $crate::HomogeneousSampler::new(weight);
                $body
            }
            $crate::WeightSpec::Uniform { low, high } => {
                let $sampler = $crate::UniformSampler::new(low, high);
                $body
            }
            $crate::WeightSpec::Normal { mu, sigma } => {
                let $sampler = $crate::NormalSampler::new(mu, sigma);
                $body
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_homogeneous_consumes_nothing() {
        let mut key = Lfsr88Key::new(3);
        let before = key;
        let s = HomogeneousSampler::new(0.25f32);
        assert_eq!(s.draw(&mut key), 0.25);
        assert_eq!(key, before);
    }

    #[test]
    fn test_uniform_matches_key_uniform() {
        let mut a = Lfsr88Key::new(8);
        let mut b = a;
        let s = UniformSampler::new(-0.5f32, 1.5);
        for _ in 0..100 {
            assert_eq!(s.draw(&mut a), b.uniform(-0.5, 1.5));
        }
    }

    #[test]
    fn test_normal_matches_key_normal() {
        let mut a = Lfsr88Key::new(8);
        let mut b = a;
        let s = NormalSampler::new(0.1f32, 2.0);
        for _ in 0..100 {
            assert_eq!(s.draw(&mut a), b.normal(0.1, 2.0));
        }
    }

    #[test]
    fn test_f64_sampler_shares_key_stream() {
        let mut a = Lfsr88Key::new(8);
        let mut b = a;
        let s32 = UniformSampler::new(0.0f32, 1.0);
        let s64 = UniformSampler::new(0.0f64, 1.0);
        for _ in 0..50 {
            let x = s32.draw(&mut a) as f64;
            let y = s64.draw(&mut b);
            assert!((x - y).abs() < 1e-6);
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_with_sampler_dispatch() {
        let spec = WeightSpec::normal(0.0f64, 1.0);
        let words = with_sampler!(spec, s => s.words_per_draw());
        assert_eq!(words, 2);
        assert_eq!(spec.mode(), WeightMode::Normal);
        assert_eq!(spec.parameters(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_weight_mode_parse() {
        assert_eq!("homo".parse::<WeightMode>().unwrap(), WeightMode::Homogeneous);
        assert_eq!("Normal".parse::<WeightMode>().unwrap(), WeightMode::Normal);
        assert!("gamma".parse::<WeightMode>().is_err());
    }
}
