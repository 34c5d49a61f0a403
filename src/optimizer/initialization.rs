use crate::error::GfResult;
use crate::grid::{grid_side, GridState};
use fastrand::Rng;

/// Slot order used to seat the codes: code `k` goes to `order[k]`.
pub fn initial_slot_order(cells: usize, shuffle: bool, rng: &mut Rng) -> Vec<usize> {
    let mut order: Vec<usize> = (0..cells).collect();
    if shuffle {
        rng.shuffle(&mut order);
    }
    order
}

/// Sizes the grid for `n` codes and seats them into the first `n` slots of
/// the (optionally shuffled) slot order. Remaining cells stay empty.
pub fn build_initial_grid(
    n: usize,
    margin: f32,
    shuffle: bool,
    rng: &mut Rng,
) -> GfResult<GridState> {
    let side = grid_side(n, margin)?;
    let order = initial_slot_order(side * side, shuffle, rng);
    GridState::with_placement(side, n, &order)
}
