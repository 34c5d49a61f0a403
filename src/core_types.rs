use crate::consts::NO_CANDIDATE;
use serde::{Deserialize, Serialize};

/// Index of a code in the input order. Stored in grid cells as `u32`.
pub type CodeIndex = u32;

/// Row-major index of a grid cell.
pub type CellIndex = usize;

/// Two cells whose occupants are exchanged in one committed batch.
pub type SwapPair = (u32, u32);

/// Per-cell result of the candidate scan.
/// `best[c]` is the partner cell of `c` (or `NO_CANDIDATE`), `delta[c]` its
/// objective-oriented energy change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateSlots {
    pub best: Vec<u32>,
    pub delta: Vec<f32>,
}

impl CandidateSlots {
    pub fn empty(cells: usize) -> Self {
        Self {
            best: vec![NO_CANDIDATE; cells],
            delta: vec![0.0; cells],
        }
    }

    pub fn len(&self) -> usize {
        self.best.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best.is_empty()
    }

    /// Most negative recorded delta, if any cell found a partner.
    pub fn best_delta(&self) -> Option<f32> {
        self.best
            .iter()
            .zip(self.delta.iter())
            .filter(|(b, _)| **b != NO_CANDIDATE)
            .map(|(_, d)| *d)
            .reduce(f32::min)
    }
}
