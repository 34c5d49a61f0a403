//! Swap energy arithmetic shared by every backend.
//!
//! Both the sequential loops and the device kernels call into this module,
//! which keeps their candidate slots identical for identical inputs.

use crate::config::RadiusPolicy;
use crate::consts::NO_CANDIDATE;
use crate::grid::{cell_dist2, max_useful_radius, neighbor_offsets, offset_cell, CellOccupancy};
use crate::similarity::{Gate, PairWeights};
use serde::{Deserialize, Serialize};

/// Set of reference cells `R` a swap delta is summed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighborScope {
    /// Every occupied cell.
    LongRange,
    /// Occupied cells within the radius of either swapped cell.
    Local(usize),
}

impl NeighborScope {
    pub fn from_radius(radius: Option<usize>) -> Self {
        match radius {
            Some(r) => NeighborScope::Local(r),
            None => NeighborScope::LongRange,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    Minimize,
    Maximize,
}

impl Objective {
    #[inline(always)]
    pub fn sign(self) -> f32 {
        match self {
            Objective::Minimize => 1.0,
            Objective::Maximize => -1.0,
        }
    }
}

/// Everything a candidate scan needs for one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochParams {
    /// Global epoch counter, polish epochs included.
    pub epoch: u32,
    pub gate: Gate,
    pub min_sim: f32,
    pub search_radius: usize,
    pub radius_policy: RadiusPolicy,
    pub seed: u64,
    pub scope: NeighborScope,
    pub objective: Objective,
}

impl EpochParams {
    /// Scan offsets for a grid of `side`, radius clamped to the grid.
    pub fn offsets(&self, side: usize) -> Vec<(i32, i32)> {
        neighbor_offsets(self.search_radius.min(max_useful_radius(side)))
    }

    #[inline]
    pub fn radius_for(&self, cell: usize) -> usize {
        match self.radius_policy {
            RadiusPolicy::Fixed => self.search_radius,
            RadiusPolicy::Sampled => {
                sampled_radius(self.seed, self.epoch, cell as u32, self.search_radius)
            }
        }
    }
}

#[inline(always)]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Counter-based radius draw in `[1, far_radius]`.
#[inline]
pub fn sampled_radius(seed: u64, epoch: u32, cell: u32, far_radius: usize) -> usize {
    if far_radius <= 1 {
        return far_radius;
    }
    let counter = ((epoch as u64) << 32) | cell as u64;
    let h = splitmix64(seed ^ splitmix64(counter));
    1 + (h % far_radius as u64) as usize
}

/// Visits the cells of the disc of `radius` around `center` in row-major
/// order, `center` included.
#[inline]
fn visit_disc(side: usize, center: usize, radius: usize, mut f: impl FnMut(usize)) {
    let (cy, cx) = ((center / side) as i64, (center % side) as i64);
    let r = radius as i64;
    let s = side as i64;
    for y in (cy - r).max(0)..=(cy + r).min(s - 1) {
        let dy = y - cy;
        for x in (cx - r).max(0)..=(cx + r).min(s - 1) {
            let dx = x - cx;
            if dy * dy + dx * dx <= r * r {
                f((y * s + x) as usize);
            }
        }
    }
}

/// Energy change of exchanging the occupants of cells `i` and `j`.
/// Negative means the swap lowers the energy.
pub fn swap_delta<G, W>(
    grid: &G,
    weights: &W,
    gate: Gate,
    scope: NeighborScope,
    i: usize,
    j: usize,
) -> f32
where
    G: CellOccupancy + ?Sized,
    W: PairWeights + ?Sized,
{
    let ci = grid.occupant(i);
    let cj = grid.occupant(j);
    if i == j || (ci.is_none() && cj.is_none()) {
        return 0.0;
    }
    let side = grid.side();

    let term = |r: usize, cr: u32| -> f32 {
        let wi = ci.map_or(0.0, |c| gate.apply(weights.raw(c, cr)));
        let wj = cj.map_or(0.0, |c| gate.apply(weights.raw(c, cr)));
        (wj - wi) * (cell_dist2(side, i, r) - cell_dist2(side, j, r))
    };

    let mut acc = 0.0f32;
    match scope {
        NeighborScope::LongRange => {
            for r in 0..grid.cell_count() {
                if r == i || r == j {
                    continue;
                }
                if let Some(cr) = grid.occupant(r) {
                    acc += term(r, cr);
                }
            }
        }
        NeighborScope::Local(radius) => {
            let radius = radius.min(max_useful_radius(side));
            let r2 = (radius * radius) as f32;
            visit_disc(side, i, radius, |r| {
                if r != i && r != j {
                    if let Some(cr) = grid.occupant(r) {
                        acc += term(r, cr);
                    }
                }
            });
            visit_disc(side, j, radius, |r| {
                // Cells already covered by the disc around `i`.
                if r != i && r != j && cell_dist2(side, i, r) > r2 {
                    if let Some(cr) = grid.occupant(r) {
                        acc += term(r, cr);
                    }
                }
            });
        }
    }
    acc
}

/// Best partner of `cell` within its search radius, as `(partner, delta)`
/// with the delta oriented by the objective. Empty cells and cells without
/// an admissible partner yield `(NO_CANDIDATE, 0.0)`.
pub fn best_candidate<G, W>(
    grid: &G,
    weights: &W,
    offsets: &[(i32, i32)],
    params: &EpochParams,
    cell: usize,
) -> (u32, f32)
where
    G: CellOccupancy + ?Sized,
    W: PairWeights + ?Sized,
{
    let Some(ci) = grid.occupant(cell) else {
        return (NO_CANDIDATE, 0.0);
    };
    let side = grid.side();
    let radius = params.radius_for(cell).min(max_useful_radius(side)) as i64;
    let r2 = radius * radius;
    let sign = params.objective.sign();

    let mut best = NO_CANDIDATE;
    let mut best_delta = f32::INFINITY;

    for &(dy, dx) in offsets {
        let (ly, lx) = (dy as i64, dx as i64);
        if ly * ly + lx * lx > r2 {
            continue;
        }
        let Some(j) = offset_cell(side, cell, dy, dx) else {
            continue;
        };
        if let Some(cj) = grid.occupant(j) {
            if weights.raw(ci, cj) < params.min_sim {
                continue;
            }
        }
        let d = sign * swap_delta(grid, weights, params.gate, params.scope, cell, j);
        if d < best_delta {
            best = j as u32;
            best_delta = d;
        }
    }

    if best == NO_CANDIDATE {
        (NO_CANDIDATE, 0.0)
    } else {
        (best, best_delta)
    }
}

/// `Σ_{r<s occupied} gate(sim(Cr, Cs)) · dist2(r, s)`.
pub fn total_energy<G, W>(grid: &G, weights: &W, gate: Gate) -> f64
where
    G: CellOccupancy + ?Sized,
    W: PairWeights + ?Sized,
{
    let side = grid.side();
    let occupied: Vec<(usize, u32)> = (0..grid.cell_count())
        .filter_map(|cell| grid.occupant(cell).map(|c| (cell, c)))
        .collect();

    let mut total = 0.0f64;
    for (a, &(ra, ca)) in occupied.iter().enumerate() {
        for &(rb, cb) in &occupied[a + 1..] {
            let w = gate.apply(weights.raw(ca, cb)) as f64;
            total += w * cell_dist2(side, ra, rb) as f64;
        }
    }
    total
}
