// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Skip-Sampled Connectivity
//!
//! A row (or column) of a JIT connectivity matrix is never stored. It is the
//! output of a [`ConnectionStream`]: starting from `init(seed + offset)`, the
//! first connected index is uniform in `[0, clen)` and every following index
//! advances by a uniform gap in `[1, clen]`, until the index leaves the
//! dimension. The expected connection density is therefore `2 / (clen + 1)`.
//!
//! Two layouts walk the same dimension:
//! - [`Layout::Serial`]: one stream covers the whole row / column.
//! - [`Layout::Lanes`]: `width` lanes each cover one contiguous block (see
//!   [`LanePartition`]) with their own stream. This is the GPU layout.

use serde::{Deserialize, Serialize};

use crate::prng::Lfsr88Key;
use crate::sampler::WeightSampler;
use crate::types::{Error, Result};

/// Largest supported dimension (rows, columns, clen)
///
/// Keeps every position `index + gap` inside `u32` on all devices.
pub const MAX_DIMENSION: u32 = i32::MAX as u32;

/// Seed and connection length of one operator invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnParams {
    seed: u32,
    clen: u32,
}

impl ConnParams {
    /// Validate and build connectivity parameters
    ///
    /// # Errors
    /// `InvalidConnLen` unless `1 <= clen <= MAX_DIMENSION`.
    pub fn new(seed: u32, clen: u32) -> Result<Self> {
        if clen == 0 || clen > MAX_DIMENSION {
            return Err(Error::InvalidConnLen {
                clen: clen as i64,
                max: MAX_DIMENSION,
            });
        }
        Ok(Self { seed, clen })
    }

    /// Parameters for a target connection probability
    ///
    /// `clen = ceil(1 / conn_prob) * 2 - 1`, which makes the expected density
    /// `2 / (clen + 1)` equal to `conn_prob` for `1 / conn_prob` integral.
    pub fn from_conn_prob(conn_prob: f64, seed: u32) -> Result<Self> {
        Self::new(seed, clen_for_conn_prob(conn_prob)?)
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn clen(&self) -> u32 {
        self.clen
    }

    /// Key for the stream at `offset` (row, column or lane id)
    #[inline(always)]
    pub fn key_for(&self, offset: u32) -> Lfsr88Key {
        Lfsr88Key::new(self.seed.wrapping_add(offset))
    }

    /// Expected number of connections along a dimension of length `dim`
    pub fn expected_degree(&self, dim: u32) -> f64 {
        dim as f64 * 2.0 / (self.clen as f64 + 1.0)
    }
}

/// Connection length for a connection probability in `(0, 1]`
pub fn clen_for_conn_prob(conn_prob: f64) -> Result<u32> {
    if !(conn_prob > 0.0 && conn_prob <= 1.0) {
        return Err(Error::InvalidConnProb(conn_prob));
    }
    let clen = (1.0 / conn_prob).ceil() * 2.0 - 1.0;
    if clen > MAX_DIMENSION as f64 {
        return Err(Error::InvalidConnLen {
            clen: clen as i64,
            max: MAX_DIMENSION,
        });
    }
    Ok(clen as u32)
}

/// Validate a single dimension against [`MAX_DIMENSION`]
pub fn check_dimension(argument: &str, dim: usize) -> Result<u32> {
    if dim > MAX_DIMENSION as usize {
        return Err(Error::DimensionTooLarge {
            argument: argument.to_string(),
            dim,
            max: MAX_DIMENSION,
        });
    }
    Ok(dim as u32)
}

/// Contiguous lane partition of one dimension
///
/// Lane `t` owns `[t * step, min((t + 1) * step, dim))` with
/// `step = max(ceil((dim + 1) / width), 1)`; the blocks tile `[0, dim)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanePartition {
    width: u32,
}

impl LanePartition {
    /// GPU lane group size
    pub const WARP_WIDTH: u32 = 32;

    pub fn new(width: u32) -> Result<Self> {
        if width == 0 {
            return Err(Error::InvalidArgument {
                argument: "lane_width".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(Self { width })
    }

    pub fn warp() -> Self {
        Self {
            width: Self::WARP_WIDTH,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Block length for a dimension of length `dim`
    #[inline]
    pub fn step(&self, dim: u32) -> u32 {
        // ceil((dim + 1) / width) == (dim + width) / width, widened for dim = u32::MAX
        let step = (dim as u64 + self.width as u64) / self.width as u64;
        (step as u32).max(1)
    }

    /// Index range `[start, end)` owned by `lane` (may be empty)
    #[inline]
    pub fn range(&self, lane: u32, dim: u32) -> (u32, u32) {
        let step = self.step(dim) as u64;
        let start = (lane as u64 * step).min(dim as u64);
        let end = (start + step).min(dim as u64);
        (start as u32, end as u32)
    }

    /// Stream id of `lane` within `group` (row or column index)
    #[inline(always)]
    pub fn stream_id(&self, group: u32, lane: u32) -> u32 {
        group.wrapping_mul(self.width).wrapping_add(lane)
    }
}

impl Default for LanePartition {
    fn default() -> Self {
        Self::warp()
    }
}

/// How a backend walks one row / column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layout {
    /// One stream per row / column
    Serial,
    /// `width` lane streams per row / column
    Lanes(LanePartition),
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layout::Serial => write!(f, "serial"),
            Layout::Lanes(p) => write!(f, "lanes({})", p.width()),
        }
    }
}

/// Lazy, strictly increasing stream of `(index, weight)` connections
///
/// The weight for an index is drawn before the gap to the next index, so
/// matvec and materialization kernels consume the key in the same order.
#[derive(Debug, Clone)]
pub struct ConnectionStream<S> {
    key: Lfsr88Key,
    position: u32,
    end: u32,
    clen: u32,
    sampler: S,
}

impl<S: WeightSampler> ConnectionStream<S> {
    /// Serial stream for row / column `offset` over `[0, bound)`
    #[inline]
    pub fn serial(conn: &ConnParams, offset: u32, bound: u32, sampler: S) -> Self {
        let mut key = conn.key_for(offset);
        let position = key.uniform_int(0, conn.clen - 1);
        Self {
            key,
            position,
            end: bound,
            clen: conn.clen,
            sampler,
        }
    }

    /// Lane stream `stream_id` restricted to `[start, end)`
    ///
    /// The first index is `start - 1 + gap`, so a lane never emits an index
    /// owned by its predecessor.
    #[inline]
    pub fn lane(conn: &ConnParams, stream_id: u32, start: u32, end: u32, sampler: S) -> Self {
        let mut key = conn.key_for(stream_id);
        let gap = key.uniform_int(1, conn.clen);
        Self {
            key,
            position: start + (gap - 1),
            end,
            clen: conn.clen,
            sampler,
        }
    }
}

impl<S: WeightSampler> Iterator for ConnectionStream<S> {
    type Item = (u32, S::Weight);

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.end {
            return None;
        }
        let index = self.position;
        let weight = self.sampler.draw(&mut self.key);
        let gap = self.key.uniform_int(1, self.clen);
        // saturate so a finished stream stays finished
        self.position = self.position.saturating_add(gap);
        Some((index, weight))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.position >= self.end {
            (0, Some(0))
        } else {
            (1, Some((self.end - self.position) as usize))
        }
    }
}

impl<S: WeightSampler> std::iter::FusedIterator for ConnectionStream<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{HomogeneousSampler, UniformSampler};

    fn indices(stream: ConnectionStream<HomogeneousSampler<f32>>) -> Vec<u32> {
        stream.map(|(i, _)| i).collect()
    }

    #[test]
    fn test_conn_params_rejects_zero_clen() {
        assert!(matches!(
            ConnParams::new(0, 0),
            Err(Error::InvalidConnLen { clen: 0, .. })
        ));
        assert!(ConnParams::new(0, MAX_DIMENSION + 1).is_err());
        assert!(ConnParams::new(0, 1).is_ok());
    }

    #[test]
    fn test_clen_for_conn_prob() {
        assert_eq!(clen_for_conn_prob(0.1).unwrap(), 19);
        assert_eq!(clen_for_conn_prob(0.5).unwrap(), 3);
        assert_eq!(clen_for_conn_prob(1.0).unwrap(), 1);
        assert_eq!(clen_for_conn_prob(0.3).unwrap(), 7);
        assert!(clen_for_conn_prob(0.0).is_err());
        assert!(clen_for_conn_prob(1.5).is_err());
        assert!(clen_for_conn_prob(f64::NAN).is_err());
    }

    #[test]
    fn test_clen_one_is_dense() {
        let conn = ConnParams::new(9, 1).unwrap();
        let got = indices(ConnectionStream::serial(&conn, 3, 50, HomogeneousSampler::new(1.0)));
        assert_eq!(got, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_stream_is_strictly_increasing_and_bounded() {
        let conn = ConnParams::new(1234, 8).unwrap();
        for offset in 0..50 {
            let got = indices(ConnectionStream::serial(&conn, offset, 300, HomogeneousSampler::new(1.0)));
            assert!(got.windows(2).all(|w| w[0] < w[1]));
            assert!(got.iter().all(|&i| i < 300));
            if let Some(&first) = got.first() {
                assert!(first < 300);
            }
        }
    }

    #[test]
    fn test_stream_replays_identically() {
        let conn = ConnParams::new(77, 5).unwrap();
        let a: Vec<_> = ConnectionStream::serial(&conn, 11, 400, UniformSampler::new(-1.0f32, 1.0)).collect();
        let b: Vec<_> = ConnectionStream::serial(&conn, 11, 400, UniformSampler::new(-1.0f32, 1.0)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_bound() {
        let conn = ConnParams::new(0, 3).unwrap();
        let mut s = ConnectionStream::serial(&conn, 0, 0, HomogeneousSampler::new(1.0f32));
        assert_eq!(s.next(), None);
        assert_eq!(s.next(), None);
    }

    #[test]
    fn test_sampling_interleaves_with_gaps() {
        // the uniform sampler consumes one word per connection, before the gap
        let conn = ConnParams::new(31, 4).unwrap();
        let mut key = conn.key_for(2);
        let mut expected = Vec::new();
        let mut pos = key.uniform_int(0, 3);
        while pos < 64 {
            let w = key.uniform(0.0, 2.0);
            expected.push((pos, w));
            pos += key.uniform_int(1, 4);
        }
        let got: Vec<_> = ConnectionStream::serial(&conn, 2, 64, UniformSampler::new(0.0f32, 2.0)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_lane_partition_tiles_dimension() {
        for width in [1u32, 3, 8, 32] {
            let p = LanePartition::new(width).unwrap();
            for dim in [0u32, 1, 2, 31, 32, 33, 100, 1000] {
                let mut covered = Vec::new();
                for lane in 0..width {
                    let (start, end) = p.range(lane, dim);
                    assert!(start <= end);
                    covered.extend(start..end);
                }
                assert_eq!(covered, (0..dim).collect::<Vec<_>>(), "width {width} dim {dim}");
            }
        }
    }

    #[test]
    fn test_lane_step() {
        let p = LanePartition::warp();
        assert_eq!(p.step(0), 1);
        assert_eq!(p.step(31), 1);
        assert_eq!(p.step(32), 2);
        assert_eq!(p.step(1000), 32);
        assert_eq!(p.step(u32::MAX), u32::MAX / 32 + 1);
    }

    #[test]
    fn test_lane_stream_stays_in_range() {
        let conn = ConnParams::new(5, 6).unwrap();
        let p = LanePartition::warp();
        let dim = 500;
        for lane in 0..32 {
            let (start, end) = p.range(lane, dim);
            let got = indices(ConnectionStream::lane(
                &conn,
                p.stream_id(7, lane),
                start,
                end,
                HomogeneousSampler::new(1.0),
            ));
            assert!(got.iter().all(|&i| i >= start && i < end));
        }
    }

    #[test]
    fn test_lane_clen_one_is_dense() {
        let conn = ConnParams::new(5, 1).unwrap();
        let p = LanePartition::new(4).unwrap();
        let dim = 37;
        let mut all = Vec::new();
        for lane in 0..4 {
            let (start, end) = p.range(lane, dim);
            all.extend(indices(ConnectionStream::lane(
                &conn,
                p.stream_id(0, lane),
                start,
                end,
                HomogeneousSampler::new(1.0),
            )));
        }
        assert_eq!(all, (0..dim).collect::<Vec<_>>());
    }

    #[test]
    fn test_expected_degree() {
        let conn = ConnParams::new(0, 19).unwrap();
        assert!((conn.expected_degree(1000) - 100.0).abs() < 1e-9);
    }
}
