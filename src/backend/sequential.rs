use super::{BackendKind, PlacementBackend};
use crate::code::CodeSet;
use crate::core_types::CandidateSlots;
use crate::energy::{best_candidate, EpochParams};
use crate::error::{GfResult, GridForgeError};
use crate::grid::{CellOccupancy, GridState};
use crate::optimizer::batch::Batch;
use crate::similarity::{PairWeights, SimilarityCache};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

/// Host loops over a [`GridState`]. The read-only candidate scan can fan
/// out over rayon, one output slot per cell.
pub struct SequentialBackend {
    codes: Arc<CodeSet>,
    cache: Option<SimilarityCache>,
    grid: Option<GridState>,
    parallel_scan: bool,
}

impl SequentialBackend {
    pub fn new(codes: Arc<CodeSet>, similarity_cache: bool, parallel_scan: bool) -> Self {
        let cache = similarity_cache.then(|| SimilarityCache::build(&codes));
        Self {
            codes,
            cache,
            grid: None,
            parallel_scan,
        }
    }

    fn grid(&self) -> GfResult<&GridState> {
        self.grid
            .as_ref()
            .ok_or_else(|| GridForgeError::Validation("No grid uploaded to backend".to_string()))
    }
}

fn scan<W: PairWeights + ?Sized>(
    grid: &GridState,
    weights: &W,
    params: &EpochParams,
    parallel: bool,
) -> CandidateSlots {
    let offsets = params.offsets(grid.side());
    let mut slots = CandidateSlots::empty(grid.cell_count());

    if parallel {
        slots
            .best
            .par_iter_mut()
            .zip(slots.delta.par_iter_mut())
            .enumerate()
            .for_each(|(cell, (b, d))| {
                (*b, *d) = best_candidate(grid, weights, &offsets, params, cell);
            });
    } else {
        for cell in 0..grid.cell_count() {
            let (b, d) = best_candidate(grid, weights, &offsets, params, cell);
            slots.best[cell] = b;
            slots.delta[cell] = d;
        }
    }
    slots
}

impl PlacementBackend for SequentialBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sequential
    }

    fn upload_state(&mut self, grid: &GridState) -> GfResult<()> {
        grid.check_conservation(self.codes.len())?;
        self.grid = Some(grid.clone());
        Ok(())
    }

    fn find_best_candidates(&mut self, params: &EpochParams) -> GfResult<CandidateSlots> {
        let grid = self.grid()?;
        let slots = match &self.cache {
            Some(cache) => scan(grid, cache, params, self.parallel_scan),
            None => scan(grid, self.codes.as_ref(), params, self.parallel_scan),
        };
        Ok(slots)
    }

    fn apply_batch(&mut self, batch: &Batch) -> GfResult<()> {
        let cells = self.grid()?.cell_count();
        batch.validate(cells)?;
        if let Some(grid) = self.grid.as_mut() {
            for &(a, b) in batch.pairs() {
                grid.swap(a as usize, b as usize);
            }
        }
        Ok(())
    }

    fn download_state(&mut self) -> GfResult<GridState> {
        Ok(self.grid()?.clone())
    }

    fn release(&mut self) {
        if self.grid.take().is_some() || self.cache.is_some() {
            debug!("Sequential backend released");
        }
        self.cache = None;
    }
}
