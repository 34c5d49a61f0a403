//! Interchangeable execution strategies for the per-epoch steps.

pub mod parallel;
pub mod sequential;

use crate::code::CodeSet;
use crate::config::PlacementConfig;
use crate::core_types::CandidateSlots;
use crate::device::DeviceOptions;
use crate::energy::EpochParams;
use crate::error::GfResult;
use crate::grid::GridState;
use crate::optimizer::batch::Batch;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString};

pub use parallel::ParallelBackend;
pub use sequential::SequentialBackend;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sequential,
    Parallel,
}

/// The four steps the orchestrator drives. A backend owns the working grid
/// between `upload_state` and `download_state`.
pub trait PlacementBackend: Send {
    fn kind(&self) -> BackendKind;

    fn upload_state(&mut self, grid: &GridState) -> GfResult<()>;

    /// Best partner and delta for every cell of the current grid.
    fn find_best_candidates(&mut self, params: &EpochParams) -> GfResult<CandidateSlots>;

    /// Commits a conflict-free batch. Either every pair is applied or none.
    fn apply_batch(&mut self, batch: &Batch) -> GfResult<()>;

    fn download_state(&mut self) -> GfResult<GridState>;

    /// Frees backend resources early. Dropping the backend does the same.
    fn release(&mut self) {}
}

pub fn create_backend(
    kind: BackendKind,
    codes: Arc<CodeSet>,
    config: &PlacementConfig,
) -> GfResult<Box<dyn PlacementBackend>> {
    match kind {
        BackendKind::Sequential => Ok(Box::new(SequentialBackend::new(
            codes,
            config.similarity_cache,
            config.parallel_scan,
        ))),
        BackendKind::Parallel => {
            let options = DeviceOptions {
                threads: config.device_threads,
                ..DeviceOptions::default()
            };
            Ok(Box::new(ParallelBackend::new(
                &codes,
                config.similarity_cache,
                options,
            )?))
        }
    }
}
