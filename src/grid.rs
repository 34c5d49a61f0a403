use crate::consts::{EMPTY_CELL, MAX_GRID_CELLS};
use crate::error::{GfResult, GridForgeError};
use serde::{Deserialize, Serialize};

/// Read access to a square occupancy grid.
/// Implemented by the host [`GridState`] and the device grid buffer.
pub trait CellOccupancy {
    fn side(&self) -> usize;
    fn occupant(&self, cell: usize) -> Option<u32>;

    #[inline(always)]
    fn cell_count(&self) -> usize {
        self.side() * self.side()
    }
}

/// Smallest side `S` with `S² ≥ n·(1 + margin)`.
///
/// Fails when the grid would need more cells than a `u32` cell index can
/// address.
pub fn grid_side(n: usize, margin: f32) -> GfResult<usize> {
    let too_large = || {
        GridForgeError::Config(format!(
            "A grid for {} codes with margin {} exceeds {} cells",
            n, margin, MAX_GRID_CELLS
        ))
    };
    let wanted = n as f64 * (1.0 + margin.max(0.0) as f64);
    if !wanted.is_finite() || wanted > MAX_GRID_CELLS as f64 {
        return Err(too_large());
    }
    let target = (wanted.ceil() as usize).max(n);
    let mut side = (target as f64).sqrt().ceil() as usize;
    // Guard against float rounding on both sides.
    while side > 1 && (side - 1) * (side - 1) >= target {
        side -= 1;
    }
    while side * side < target {
        side += 1;
    }
    let side = side.max(1);
    match side.checked_mul(side) {
        Some(cells) if cells <= MAX_GRID_CELLS => Ok(side),
        _ => Err(too_large()),
    }
}

/// Smallest radius whose disc around any cell covers the whole grid,
/// i.e. `ceil(sqrt(2)·(side - 1))`, at least 1.
pub fn max_useful_radius(side: usize) -> usize {
    let span = side.saturating_sub(1) as u64;
    let reach = span.saturating_mul(span).saturating_mul(2);
    let mut r = (reach as f64).sqrt().ceil() as u64;
    while r > 0 && (r - 1) * (r - 1) >= reach {
        r -= 1;
    }
    while r.saturating_mul(r) < reach {
        r += 1;
    }
    r.max(1) as usize
}

#[inline(always)]
pub fn cell_coords(side: usize, cell: usize) -> (usize, usize) {
    (cell / side, cell % side)
}

/// Squared Euclidean distance between two cells.
#[inline(always)]
pub fn cell_dist2(side: usize, a: usize, b: usize) -> f32 {
    let dy = (a / side) as i64 - (b / side) as i64;
    let dx = (a % side) as i64 - (b % side) as i64;
    (dy * dy + dx * dx) as f32
}

/// Cell reached from `cell` by `(dy, dx)`, if it stays on the grid.
#[inline(always)]
pub fn offset_cell(side: usize, cell: usize, dy: i32, dx: i32) -> Option<usize> {
    let r = (cell / side) as i64 + dy as i64;
    let c = (cell % side) as i64 + dx as i64;
    let s = side as i64;
    if r < 0 || c < 0 || r >= s || c >= s {
        None
    } else {
        Some((r * s + c) as usize)
    }
}

/// Offsets with `dy² + dx² ≤ radius²` in row-major order, origin excluded.
/// Callers clamp `radius` to the grid with [`max_useful_radius`].
pub fn neighbor_offsets(radius: usize) -> Vec<(i32, i32)> {
    let r = radius.min(i32::MAX as usize / 2) as i64;
    let r2 = r * r;
    let mut out = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if (dy, dx) != (0, 0) && dy * dy + dx * dx <= r2 {
                out.push((dy as i32, dx as i32));
            }
        }
    }
    out
}

/// Host-side cell → occupant mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridState {
    side: usize,
    cells: Vec<u32>,
}

impl GridState {
    pub fn new_empty(side: usize) -> Self {
        Self {
            side,
            cells: vec![EMPTY_CELL; side * side],
        }
    }

    pub fn from_cells(side: usize, cells: Vec<u32>) -> GfResult<Self> {
        if cells.len() != side * side {
            return Err(GridForgeError::Validation(format!(
                "Grid of side {} needs {} cells, got {}",
                side,
                side * side,
                cells.len()
            )));
        }
        Ok(Self { side, cells })
    }

    /// Places code `k` into `slot_order[k]` for `k in 0..n`.
    pub fn with_placement(side: usize, n: usize, slot_order: &[usize]) -> GfResult<Self> {
        let mut grid = Self::new_empty(side);
        if n > grid.cells.len() || slot_order.len() < n {
            return Err(GridForgeError::Validation(format!(
                "Cannot place {} codes into a {}x{} grid",
                n, side, side
            )));
        }
        for (code, &slot) in slot_order.iter().take(n).enumerate() {
            if slot >= grid.cells.len() || grid.cells[slot] != EMPTY_CELL {
                return Err(GridForgeError::Validation(format!(
                    "Slot {} is out of range or used twice",
                    slot
                )));
            }
            grid.cells[slot] = code as u32;
        }
        Ok(grid)
    }

    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn coords(&self, cell: usize) -> (usize, usize) {
        cell_coords(self.side, cell)
    }

    pub fn cell_at(&self, row: usize, col: usize) -> usize {
        row * self.side + col
    }

    pub fn dist2(&self, a: usize, b: usize) -> f32 {
        cell_dist2(self.side, a, b)
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != EMPTY_CELL).count()
    }

    /// Cells within `radius` of `cell`, row-major, excluding `cell` itself.
    pub fn neighbors(&self, cell: usize, radius: usize, occupied_only: bool) -> Vec<usize> {
        neighbor_offsets(radius.min(max_useful_radius(self.side)))
            .into_iter()
            .filter_map(|(dy, dx)| offset_cell(self.side, cell, dy, dx))
            .filter(|&n| !occupied_only || self.cells[n] != EMPTY_CELL)
            .collect()
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        self.cells.swap(a, b);
    }

    /// Checks that every code index in `0..n` occupies exactly one cell.
    pub fn check_conservation(&self, n: usize) -> GfResult<()> {
        let mut seen = vec![false; n];
        for (cell, &code) in self.cells.iter().enumerate() {
            if code == EMPTY_CELL {
                continue;
            }
            let idx = code as usize;
            if idx >= n {
                return Err(GridForgeError::Validation(format!(
                    "Cell {} holds unknown code {}",
                    cell, code
                )));
            }
            if seen[idx] {
                return Err(GridForgeError::Validation(format!(
                    "Code {} appears more than once",
                    code
                )));
            }
            seen[idx] = true;
        }
        match seen.iter().position(|s| !s) {
            Some(missing) => Err(GridForgeError::Validation(format!(
                "Code {} is missing from the grid",
                missing
            ))),
            None => Ok(()),
        }
    }

    /// `(cell, row, col, code)` for every occupied cell in row-major order.
    pub fn row_major(&self) -> impl Iterator<Item = (usize, usize, usize, u32)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &c)| c != EMPTY_CELL)
            .map(move |(cell, &code)| (cell, cell / self.side, cell % self.side, code))
    }
}

impl CellOccupancy for GridState {
    #[inline(always)]
    fn side(&self) -> usize {
        self.side
    }

    #[inline(always)]
    fn occupant(&self, cell: usize) -> Option<u32> {
        match self.cells[cell] {
            EMPTY_CELL => None,
            code => Some(code),
        }
    }
}
