use crate::consts::NO_CANDIDATE;
use crate::core_types::{CandidateSlots, SwapPair};
use crate::error::{GfResult, GridForgeError};
use itertools::Itertools;

/// One cell's proposed exchange, transient within an epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapCandidate {
    pub cell_a: u32,
    pub cell_b: u32,
    pub delta: f32,
}

/// Mutually disjoint swaps committed together in one epoch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pairs: Vec<SwapPair>,
    total_delta: f32,
}

impl Batch {
    pub fn from_pairs(pairs: Vec<SwapPair>) -> Self {
        Self {
            pairs,
            total_delta: 0.0,
        }
    }

    pub fn pairs(&self) -> &[SwapPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Sum of the selected candidates' deltas.
    pub fn total_delta(&self) -> f32 {
        self.total_delta
    }

    /// Every cell in range and used by at most one pair.
    pub fn validate(&self, cell_count: usize) -> GfResult<()> {
        let mut claimed = vec![false; cell_count];
        for &(a, b) in &self.pairs {
            let (a, b) = (a as usize, b as usize);
            if a >= cell_count || b >= cell_count {
                return Err(GridForgeError::Batch(format!(
                    "Pair ({}, {}) is outside the {}-cell grid",
                    a, b, cell_count
                )));
            }
            if a == b || claimed[a] || claimed[b] {
                return Err(GridForgeError::Batch(format!(
                    "Pair ({}, {}) overlaps another pair in the batch",
                    a, b
                )));
            }
            claimed[a] = true;
            claimed[b] = true;
        }
        Ok(())
    }
}

/// `max(1, floor(max_batch_frac × occupied))`.
pub fn batch_budget(max_batch_frac: f32, occupied: usize) -> usize {
    ((max_batch_frac as f64 * occupied as f64).floor() as usize).max(1)
}

/// Greedy conflict-free selection over the per-cell best candidates.
///
/// Only strictly negative deltas are eligible. Candidates are taken in
/// ascending delta order (ties by cell index) and a pair is accepted only if
/// neither of its cells has been claimed, until `budget` pairs are taken.
pub fn select_batch(slots: &CandidateSlots, budget: usize) -> Batch {
    let cells = slots.len();
    let candidates = slots
        .best
        .iter()
        .zip(slots.delta.iter())
        .enumerate()
        .filter(|(_, (&b, &d))| b != NO_CANDIDATE && (b as usize) < cells && d < 0.0)
        .map(|(cell, (&b, &d))| SwapCandidate {
            cell_a: cell as u32,
            cell_b: b,
            delta: d,
        })
        .sorted_by(|x, y| {
            x.delta
                .total_cmp(&y.delta)
                .then_with(|| x.cell_a.cmp(&y.cell_a))
        });

    let mut claimed = vec![false; cells];
    let mut pairs = Vec::new();
    let mut total_delta = 0.0f32;

    for c in candidates {
        if pairs.len() >= budget {
            break;
        }
        let (a, b) = (c.cell_a as usize, c.cell_b as usize);
        if a == b || claimed[a] || claimed[b] {
            continue;
        }
        claimed[a] = true;
        claimed[b] = true;
        pairs.push((c.cell_a, c.cell_b));
        total_delta += c.delta;
    }

    Batch { pairs, total_delta }
}
