// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Host kernels shared by the CPU backends
//!
//! One generic body per iteration order; the sampler and operand are bound by
//! `with_sampler!` / `with_operand!`, the layout decides how many streams walk
//! a row / column.

use jitconn_connectivity::{
    with_sampler, ConnParams, ConnectionStream, Error, KernelFloat, Layout, Result, WeightSampler,
};
use ndarray::{Array2, ArrayViewMut1, Axis};
use rayon::prelude::*;
use tracing::trace;

use crate::operand::{Operand, OperandRef};
use crate::plan::MatvecPlan;
use crate::with_operand;

/// Visit every stream of `group` over `[0, dim)` in lane order
#[inline]
pub(crate) fn for_each_stream<S, F>(
    layout: Layout,
    conn: &ConnParams,
    group: u32,
    dim: u32,
    sampler: S,
    mut f: F,
) where
    S: WeightSampler,
    F: FnMut(ConnectionStream<S>),
{
    match layout {
        Layout::Serial => f(ConnectionStream::serial(conn, group, dim, sampler)),
        Layout::Lanes(partition) => {
            for lane in 0..partition.width() {
                let (start, end) = partition.range(lane, dim);
                f(ConnectionStream::lane(
                    conn,
                    partition.stream_id(group, lane),
                    start,
                    end,
                    sampler,
                ));
            }
        }
    }
}

/// Kernel settings of one CPU backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HostKernels {
    pub layout: Layout,
    /// Columns reduced into one private partial (column-parallel)
    pub column_chunk: usize,
    pub parallel: bool,
}

impl HostKernels {
    pub fn matvec<T: KernelFloat>(&self, plan: &MatvecPlan<T>, operand: OperandRef<'_, T>) -> Vec<T> {
        if plan.kernel.out_dim == 0 {
            return Vec::new();
        }
        with_sampler!(plan.weights, sampler => with_operand!(operand, op => {
            if plan.outdim_parallel {
                self.rows(plan, &op, sampler)
            } else {
                self.columns(plan, &op, sampler)
            }
        }))
    }

    /// One accumulator per output row, lane partials summed in lane order
    fn rows<T, O, S>(&self, plan: &MatvecPlan<T>, operand: &O, sampler: S) -> Vec<T>
    where
        T: KernelFloat,
        O: Operand<T>,
        S: WeightSampler<Weight = T>,
    {
        let layout = self.layout;
        let conn = plan.conn;
        let in_dim = plan.kernel.in_dim;

        let row_value = |row: usize| -> T {
            let mut total = T::ZERO;
            for_each_stream(layout, &conn, row as u32, in_dim, sampler, |stream| {
                let mut partial = T::ZERO;
                // weights are drawn for inactive events too, the stream yields them anyway
                for (j, w) in stream {
                    if let Some(v) = operand.gate(j as usize) {
                        partial += v * w;
                    }
                }
                total += partial;
            });
            total
        };

        let mut out = vec![T::ZERO; plan.kernel.out_dim as usize];
        if self.parallel {
            out.par_iter_mut()
                .enumerate()
                .for_each(|(row, slot)| *slot = row_value(row));
        } else {
            out.iter_mut()
                .enumerate()
                .for_each(|(row, slot)| *slot = row_value(row));
        }
        out
    }

    /// Scatter active columns into per-chunk partials, reduced in chunk order
    ///
    /// Chunks are computed in waves of one chunk per worker and added in
    /// index order, so the result does not depend on the thread count.
    fn columns<T, O, S>(&self, plan: &MatvecPlan<T>, operand: &O, sampler: S) -> Vec<T>
    where
        T: KernelFloat,
        O: Operand<T>,
        S: WeightSampler<Weight = T>,
    {
        let layout = self.layout;
        let conn = plan.conn;
        let out_dim = plan.kernel.out_dim;
        let in_dim = plan.kernel.in_dim as usize;
        let chunk = self.column_chunk.max(1);
        let n_chunks = in_dim.div_ceil(chunk);

        let chunk_partial = |c: usize| -> Option<Vec<T>> {
            let start = c * chunk;
            let end = (start + chunk).min(in_dim);
            let mut partial: Option<Vec<T>> = None;
            for col in start..end {
                let Some(v) = operand.gate(col) else {
                    continue;
                };
                let acc = partial.get_or_insert_with(|| vec![T::ZERO; out_dim as usize]);
                for_each_stream(layout, &conn, col as u32, out_dim, sampler, |stream| {
                    for (i, w) in stream {
                        acc[i as usize] += v * w;
                    }
                });
            }
            trace!(
                "[JITCONN-KERNEL] column chunk {}/{} active: {}",
                c + 1,
                n_chunks,
                partial.is_some()
            );
            partial
        };

        let wave = if self.parallel {
            rayon::current_num_threads().max(1)
        } else {
            1
        };

        let mut out = vec![T::ZERO; out_dim as usize];
        let mut next = 0;
        while next < n_chunks {
            let end = (next + wave).min(n_chunks);
            let partials: Vec<Option<Vec<T>>> = if self.parallel {
                (next..end).into_par_iter().map(&chunk_partial).collect()
            } else {
                (next..end).map(&chunk_partial).collect()
            };
            for partial in partials.into_iter().flatten() {
                for (o, p) in out.iter_mut().zip(partial) {
                    *o += p;
                }
            }
            next = end;
        }
        out
    }

    /// Kernel-orientation matrix, rows filled row-parallel, columns otherwise
    pub fn connectivity_matrix<T: KernelFloat>(&self, plan: &MatvecPlan<T>) -> Result<Array2<T>> {
        let out_dim = plan.kernel.out_dim as usize;
        let in_dim = plan.kernel.in_dim as usize;
        check_matrix_size::<T>(out_dim, in_dim)?;

        let mut matrix = Array2::from_elem((out_dim, in_dim), T::ZERO);
        let layout = self.layout;
        let conn = plan.conn;

        let (axis, dim) = if plan.outdim_parallel {
            (Axis(0), in_dim as u32)
        } else {
            (Axis(1), out_dim as u32)
        };

        with_sampler!(plan.weights, sampler => {
            if self.parallel {
                matrix
                    .axis_iter_mut(axis)
                    .into_par_iter()
                    .enumerate()
                    .for_each(|(group, line)| fill_line(layout, &conn, group as u32, dim, sampler, line));
            } else {
                matrix
                    .axis_iter_mut(axis)
                    .enumerate()
                    .for_each(|(group, line)| fill_line(layout, &conn, group as u32, dim, sampler, line));
            }
        });
        Ok(matrix)
    }
}

fn fill_line<T, S>(
    layout: Layout,
    conn: &ConnParams,
    group: u32,
    dim: u32,
    sampler: S,
    mut line: ArrayViewMut1<'_, T>,
) where
    T: KernelFloat,
    S: WeightSampler<Weight = T>,
{
    for_each_stream(layout, conn, group, dim, sampler, |stream| {
        for (index, w) in stream {
            line[index as usize] = w;
        }
    });
}

/// Refuse matrices whose element count overflows the address space
pub(crate) fn check_matrix_size<T>(out_dim: usize, in_dim: usize) -> Result<usize> {
    let max_elements = isize::MAX as usize / std::mem::size_of::<T>().max(1);
    out_dim
        .checked_mul(in_dim)
        .filter(|&n| n <= max_elements)
        .ok_or_else(|| Error::InvalidArgument {
            argument: "shape".to_string(),
            reason: format!("a {} x {} dense matrix cannot be allocated", out_dim, in_dim),
        })
}
