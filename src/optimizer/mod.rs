pub mod batch;
pub mod initialization;
pub mod runner;

pub use self::batch::{batch_budget, select_batch, Batch, SwapCandidate};
pub use self::runner::{
    EngineBuildParams, EpochReport, NoProgress, Phase, PlacedEntry, Placement, PlacementEngine,
    ProgressCallback, RunOutcome, RunState,
};
