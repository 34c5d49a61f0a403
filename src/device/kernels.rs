use super::{DeviceBuffer, DeviceContext};
use crate::consts::{EMPTY_CELL, MAX_WORKGROUP_SIZE};
use crate::energy::{best_candidate, EpochParams};
use crate::error::{GfResult, GridForgeError};
use crate::grid::CellOccupancy;
use crate::similarity::{fill_similarity_row, PackedCodes, PairWeights};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// Occupancy view over the device grid buffer.
pub struct AtomicGridView<'a> {
    pub side: usize,
    pub cells: &'a [AtomicU32],
}

impl CellOccupancy for AtomicGridView<'_> {
    #[inline(always)]
    fn side(&self) -> usize {
        self.side
    }

    #[inline(always)]
    fn occupant(&self, cell: usize) -> Option<u32> {
        match self.cells[cell].load(Ordering::Relaxed) {
            EMPTY_CELL => None,
            code => Some(code),
        }
    }
}

const ENTRY_POINTS: [&str; 3] = ["similarity_matrix", "best_candidate", "swap_pairs"];

/// The compiled placement kernels.
#[derive(Debug, Clone)]
pub struct KernelProgram {
    workgroup_size: usize,
}

impl KernelProgram {
    pub fn build(ctx: &DeviceContext, workgroup_size: usize) -> GfResult<Self> {
        if workgroup_size == 0
            || !workgroup_size.is_power_of_two()
            || workgroup_size > MAX_WORKGROUP_SIZE
        {
            return Err(GridForgeError::Device(format!(
                "program build failed: workgroup size {} must be a power of two in [1, {}]",
                workgroup_size, MAX_WORKGROUP_SIZE
            )));
        }
        debug!(
            "Built kernel program {:?} (workgroup {}, {} workers)",
            ENTRY_POINTS,
            workgroup_size,
            ctx.worker_count()
        );
        Ok(Self { workgroup_size })
    }

    pub fn workgroup_size(&self) -> usize {
        self.workgroup_size
    }

    /// One work item per matrix row.
    pub fn similarity_matrix(
        &self,
        ctx: &mut DeviceContext,
        codes: &DeviceBuffer<u64>,
        words_per_code: usize,
        n: usize,
        out: &mut DeviceBuffer<f32>,
    ) {
        ctx.assert_fenced(codes);
        assert_eq!(out.len(), n * n, "similarity buffer has the wrong size");
        let view = PackedCodes {
            words_per_code,
            words: codes.kernel_view(),
        };
        let rows = out.kernel_view_mut();
        ctx.run(|| {
            rows.par_chunks_mut(n)
                .enumerate()
                .for_each(|(row, slots)| fill_similarity_row(&view, row, slots));
        });
        ctx.mark_written(out);
    }

    /// Pass 1: one work item per cell, each writing only its own slots.
    #[allow(clippy::too_many_arguments)]
    pub fn best_candidates<W: PairWeights + ?Sized>(
        &self,
        ctx: &mut DeviceContext,
        grid: &DeviceBuffer<AtomicU32>,
        side: usize,
        weights: &W,
        params: &EpochParams,
        best: &mut DeviceBuffer<u32>,
        delta: &mut DeviceBuffer<f32>,
    ) {
        ctx.assert_fenced(grid);
        let cells = grid.len();
        assert_eq!(best.len(), cells, "best-index buffer has the wrong size");
        assert_eq!(delta.len(), cells, "best-delta buffer has the wrong size");

        let view = AtomicGridView {
            side,
            cells: grid.kernel_view(),
        };
        let offsets = params.offsets(side);
        let wg = self.workgroup_size();
        let best_slots = best.kernel_view_mut();
        let delta_slots = delta.kernel_view_mut();

        ctx.run(|| {
            best_slots
                .par_chunks_mut(wg)
                .zip(delta_slots.par_chunks_mut(wg))
                .enumerate()
                .for_each(|(group, (bs, ds))| {
                    for (local, (b, d)) in bs.iter_mut().zip(ds.iter_mut()).enumerate() {
                        let cell = group * wg + local;
                        let (cand, cand_delta) =
                            best_candidate(&view, weights, &offsets, params, cell);
                        *b = cand;
                        *d = cand_delta;
                    }
                });
        });
        ctx.mark_written(best);
        ctx.mark_written(delta);
    }

    /// Pass 2: one work item per pair, exchanging the two cells in place.
    /// Pairs must be disjoint.
    pub fn swap_pairs(
        &self,
        ctx: &mut DeviceContext,
        pairs: &DeviceBuffer<u32>,
        grid: &mut DeviceBuffer<AtomicU32>,
    ) {
        ctx.assert_fenced(pairs);
        let flat = pairs.kernel_view();
        let cells = grid.kernel_view();
        ctx.run(|| {
            flat.par_chunks(2).for_each(|pair| {
                let (a, b) = (pair[0] as usize, pair[1] as usize);
                let va = cells[a].load(Ordering::Relaxed);
                let vb = cells[b].load(Ordering::Relaxed);
                cells[a].store(vb, Ordering::Relaxed);
                cells[b].store(va, Ordering::Relaxed);
            });
        });
        ctx.mark_written(grid);
    }
}
