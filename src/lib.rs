pub mod api;
pub mod backend;
pub mod code;
pub mod config;
pub mod consts;
pub mod core_types;
pub mod device;
pub mod energy;
pub mod error;
pub mod grid;
pub mod optimizer;
pub mod similarity;

pub use backend::{BackendKind, PlacementBackend};
pub use code::{CodeSet, SparseCode};
pub use config::{PlacementConfig, PolishMode, RadiusPolicy};
pub use error::{GfResult, GridForgeError};
pub use grid::GridState;
pub use optimizer::{EpochReport, Placement, PlacementEngine, ProgressCallback, RunOutcome, RunState};
