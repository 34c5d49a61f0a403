use super::{BackendKind, PlacementBackend};
use crate::code::CodeSet;
use crate::core_types::CandidateSlots;
use crate::device::kernels::KernelProgram;
use crate::device::{DeviceBuffer, DeviceContext, DeviceOptions};
use crate::energy::EpochParams;
use crate::error::{GfResult, GridForgeError};
use crate::grid::{CellOccupancy, GridState};
use crate::optimizer::batch::Batch;
use crate::similarity::{PackedCodes, SimilarityMatrix};
use std::sync::atomic::AtomicU32;
use tracing::{debug, info};

/// Grid-resident buffers, created by `upload_state`.
struct GridBuffers {
    side: usize,
    grid: DeviceBuffer<AtomicU32>,
    best: DeviceBuffer<u32>,
    delta: DeviceBuffer<f32>,
    pairs: DeviceBuffer<u32>,
}

/// Data-parallel backend over an explicit [`DeviceContext`].
///
/// Each epoch dispatches two kernels: the candidate scan (one work item per
/// cell) and the in-place exchange (one work item per pair), with a barrier
/// before every host readback and before the exchange.
pub struct ParallelBackend {
    ctx: DeviceContext,
    program: KernelProgram,
    n: usize,
    words_per_code: usize,
    codes: Option<DeviceBuffer<u64>>,
    similarity: Option<DeviceBuffer<f32>>,
    state: Option<GridBuffers>,
}

impl ParallelBackend {
    pub fn new(codes: &CodeSet, similarity_cache: bool, options: DeviceOptions) -> GfResult<Self> {
        let mut ctx = DeviceContext::new(options)?;
        let program = KernelProgram::build(&ctx, ctx.options().workgroup_size)?;

        let n = codes.len();
        let words_per_code = codes.words_per_code();
        let code_buf = ctx.create_buffer_init("codes", codes.packed_words().to_vec());
        ctx.finish();

        let similarity = if similarity_cache {
            let mut sim = ctx.create_buffer("similarity", n * n, 0.0f32);
            program.similarity_matrix(&mut ctx, &code_buf, words_per_code, n, &mut sim);
            ctx.finish();
            debug!("Device similarity matrix built ({}x{})", n, n);
            Some(sim)
        } else {
            None
        };

        Ok(Self {
            ctx,
            program,
            n,
            words_per_code,
            codes: Some(code_buf),
            similarity,
            state: None,
        })
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    /// Number of device buffers currently allocated.
    pub fn resident_buffers(&self) -> usize {
        self.codes.is_some() as usize
            + self.similarity.is_some() as usize
            + self.state.as_ref().map_or(0, |_| 4)
    }
}

fn not_uploaded() -> GridForgeError {
    GridForgeError::Validation("No grid uploaded to backend".to_string())
}

fn released() -> GridForgeError {
    GridForgeError::Device("device released".to_string())
}

impl PlacementBackend for ParallelBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Parallel
    }

    fn upload_state(&mut self, grid: &GridState) -> GfResult<()> {
        if self.ctx.is_released() {
            return Err(released());
        }
        grid.check_conservation(self.n)?;
        let cells = grid.cell_count();
        let state = GridBuffers {
            side: grid.side(),
            grid: self.ctx.create_atomic_buffer("grid", grid.cells()),
            best: self.ctx.create_buffer("best_index", cells, 0u32),
            delta: self.ctx.create_buffer("best_delta", cells, 0.0f32),
            pairs: self.ctx.create_buffer_init("pairs", Vec::with_capacity(cells)),
        };
        self.ctx.finish();
        self.state = Some(state);
        Ok(())
    }

    fn find_best_candidates(&mut self, params: &EpochParams) -> GfResult<CandidateSlots> {
        let state = self.state.as_mut().ok_or_else(not_uploaded)?;

        match &self.similarity {
            Some(sim) => {
                self.ctx.assert_fenced(sim);
                let weights = SimilarityMatrix {
                    n: self.n,
                    values: sim.kernel_view(),
                };
                self.program.best_candidates(
                    &mut self.ctx,
                    &state.grid,
                    state.side,
                    &weights,
                    params,
                    &mut state.best,
                    &mut state.delta,
                );
            }
            None => {
                let codes = self.codes.as_ref().ok_or_else(released)?;
                self.ctx.assert_fenced(codes);
                let weights = PackedCodes {
                    words_per_code: self.words_per_code,
                    words: codes.kernel_view(),
                };
                self.program.best_candidates(
                    &mut self.ctx,
                    &state.grid,
                    state.side,
                    &weights,
                    params,
                    &mut state.best,
                    &mut state.delta,
                );
            }
        }

        // Barrier between the scan and the readback.
        self.ctx.finish();

        let mut slots = CandidateSlots::empty(state.grid.len());
        self.ctx.read_into(&state.best, &mut slots.best);
        self.ctx.read_into(&state.delta, &mut slots.delta);
        Ok(slots)
    }

    fn apply_batch(&mut self, batch: &Batch) -> GfResult<()> {
        let state = self.state.as_mut().ok_or_else(not_uploaded)?;
        batch.validate(state.grid.len())?;
        if batch.is_empty() {
            return Ok(());
        }

        let flat: Vec<u32> = batch.pairs().iter().flat_map(|&(a, b)| [a, b]).collect();
        self.ctx.write_buffer(&mut state.pairs, &flat);
        // Barrier between the pair upload and the exchange.
        self.ctx.finish();

        self.program
            .swap_pairs(&mut self.ctx, &state.pairs, &mut state.grid);
        self.ctx.finish();
        Ok(())
    }

    fn download_state(&mut self) -> GfResult<GridState> {
        let state = self.state.as_ref().ok_or_else(not_uploaded)?;
        self.ctx.finish();
        let mut cells = vec![0u32; state.grid.len()];
        self.ctx.read_atomic_into(&state.grid, &mut cells);
        GridState::from_cells(state.side, cells)
    }

    fn release(&mut self) {
        self.state = None;
        self.similarity = None;
        self.codes = None;
        self.ctx.release();
    }
}

impl Drop for ParallelBackend {
    fn drop(&mut self) {
        if !self.ctx.is_released() {
            info!("Parallel backend dropped, releasing device");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SequentialBackend;
    use crate::code::SparseCode;
    use crate::config::RadiusPolicy;
    use crate::energy::{NeighborScope, Objective};
    use crate::similarity::Gate;
    use std::sync::Arc;

    fn codes() -> CodeSet {
        let codes: Vec<SparseCode> = ["110000", "000011", "111000", "000111", "100001"]
            .iter()
            .map(|b| b.parse().unwrap())
            .collect();
        CodeSet::from_codes(&codes).unwrap()
    }

    fn options() -> DeviceOptions {
        DeviceOptions {
            threads: 2,
            workgroup_size: 4,
        }
    }

    fn params(policy: RadiusPolicy) -> EpochParams {
        EpochParams {
            epoch: 2,
            gate: Gate::new(0.1, Some(6.0)),
            min_sim: 0.0,
            search_radius: 2,
            radius_policy: policy,
            seed: 11,
            scope: NeighborScope::Local(2),
            objective: Objective::Minimize,
        }
    }

    #[test]
    fn test_matches_sequential_slots() {
        let set = codes();
        let grid = GridState::with_placement(3, 5, &[8, 0, 4, 6, 2]).unwrap();

        for policy in [RadiusPolicy::Fixed, RadiusPolicy::Sampled] {
            for cache in [false, true] {
                let mut seq = SequentialBackend::new(Arc::new(set.clone()), cache, false);
                let mut par = ParallelBackend::new(&set, cache, options()).unwrap();
                seq.upload_state(&grid).unwrap();
                par.upload_state(&grid).unwrap();
                assert_eq!(
                    par.find_best_candidates(&params(policy)).unwrap(),
                    seq.find_best_candidates(&params(policy)).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_apply_batch_is_all_or_nothing() {
        let set = codes();
        let grid = GridState::with_placement(3, 5, &[0, 1, 2, 3, 4]).unwrap();
        let mut par = ParallelBackend::new(&set, false, options()).unwrap();
        par.upload_state(&grid).unwrap();

        let overlapping = Batch::from_pairs(vec![(0, 5), (5, 6)]);
        assert!(matches!(
            par.apply_batch(&overlapping),
            Err(GridForgeError::Batch(_))
        ));
        assert_eq!(par.download_state().unwrap(), grid);

        par.apply_batch(&Batch::from_pairs(vec![(0, 8), (1, 7)])).unwrap();
        let out = par.download_state().unwrap();
        assert_eq!(out.cells()[8], 0);
        assert_eq!(out.cells()[7], 1);
        assert!(out.check_conservation(5).is_ok());
    }

    #[test]
    fn test_bad_workgroup_is_device_error() {
        let set = codes();
        let result = ParallelBackend::new(
            &set,
            false,
            DeviceOptions {
                threads: 1,
                workgroup_size: 48,
            },
        );
        assert!(matches!(result, Err(GridForgeError::Device(_))));
    }

    #[test]
    fn test_explicit_release() {
        let grid = GridState::with_placement(3, 5, &[0, 1, 2, 3, 4]).unwrap();
        let mut par = ParallelBackend::new(&codes(), true, options()).unwrap();
        assert_eq!(par.resident_buffers(), 2);
        par.upload_state(&grid).unwrap();
        assert_eq!(par.resident_buffers(), 6);

        par.release();
        assert!(par.context().is_released());
        assert_eq!(par.resident_buffers(), 0);
        assert!(par.download_state().is_err());
        assert!(matches!(
            par.upload_state(&grid),
            Err(GridForgeError::Device(_))
        ));

        let mut uncached = ParallelBackend::new(&codes(), false, options()).unwrap();
        assert_eq!(uncached.resident_buffers(), 1);
        uncached.release();
        assert_eq!(uncached.resident_buffers(), 0);
    }
}
