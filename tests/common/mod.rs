#![allow(dead_code)]

use fastrand::Rng;
use gridforge::backend::{BackendKind, PlacementBackend, SequentialBackend};
use gridforge::code::{CodeSet, SparseCode};
use gridforge::config::PlacementConfig;
use gridforge::core_types::CandidateSlots;
use gridforge::energy::EpochParams;
use gridforge::error::GfResult;
use gridforge::grid::GridState;
use gridforge::optimizer::Batch;
use std::sync::{Arc, Mutex};

pub fn code(bits: &str) -> SparseCode {
    bits.parse().unwrap()
}

pub fn labelled(bits: &[&str]) -> Vec<(String, SparseCode)> {
    bits.iter()
        .enumerate()
        .map(|(i, b)| (format!("c{}", i), code(b)))
        .collect()
}

/// `clusters` groups of codes that share most of a base pattern.
pub fn clustered_entries(
    clusters: usize,
    per_cluster: usize,
    bits: usize,
    seed: u64,
) -> Vec<(String, SparseCode)> {
    let mut rng = Rng::with_seed(seed);
    let mut out = Vec::new();
    for c in 0..clusters {
        let base: Vec<usize> = (0..bits / 4).map(|_| rng.usize(0..bits)).collect();
        for m in 0..per_cluster {
            let mut active = base.clone();
            active.push(rng.usize(0..bits));
            active.retain(|_| rng.f32() > 0.1);
            out.push((
                format!("k{}_{}", c, m),
                SparseCode::from_active(bits, &active).unwrap(),
            ));
        }
    }
    out
}

pub fn small_config() -> PlacementConfig {
    PlacementConfig {
        epochs: 30,
        far_radius: 3,
        lambda_start: 0.0,
        lambda_end: 0.2,
        max_batch_frac: 0.3,
        ..PlacementConfig::default()
    }
}

#[derive(Debug, Clone)]
pub struct EpochRecord {
    pub before: GridState,
    pub slots: CandidateSlots,
    pub params: EpochParams,
    pub batch: Vec<(u32, u32)>,
    pub after: GridState,
}

/// Wraps a sequential backend and records every committed epoch.
pub struct RecordingBackend {
    inner: SequentialBackend,
    last: Option<(CandidateSlots, EpochParams)>,
    pub log: Arc<Mutex<Vec<EpochRecord>>>,
}

impl RecordingBackend {
    pub fn new(codes: &[SparseCode], config: &PlacementConfig) -> Self {
        let set = Arc::new(CodeSet::from_codes(codes).unwrap());
        Self {
            inner: SequentialBackend::new(set, config.similarity_cache, config.parallel_scan),
            last: None,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl PlacementBackend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sequential
    }

    fn upload_state(&mut self, grid: &GridState) -> GfResult<()> {
        self.inner.upload_state(grid)
    }

    fn find_best_candidates(&mut self, params: &EpochParams) -> GfResult<CandidateSlots> {
        let slots = self.inner.find_best_candidates(params)?;
        self.last = Some((slots.clone(), *params));
        Ok(slots)
    }

    fn apply_batch(&mut self, batch: &Batch) -> GfResult<()> {
        let before = self.inner.download_state()?;
        self.inner.apply_batch(batch)?;
        let after = self.inner.download_state()?;
        if let Some((slots, params)) = self.last.take() {
            self.log.lock().unwrap().push(EpochRecord {
                before,
                slots,
                params,
                batch: batch.pairs().to_vec(),
                after,
            });
        }
        Ok(())
    }

    fn download_state(&mut self) -> GfResult<GridState> {
        self.inner.download_state()
    }

    fn release(&mut self) {
        self.inner.release();
    }
}

/// Codes in input order, for building a matching `CodeSet`.
pub fn codes_of(entries: &[(String, SparseCode)]) -> Vec<SparseCode> {
    entries.iter().map(|(_, c)| c.clone()).collect()
}
