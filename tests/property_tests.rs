use gridforge::api::place_codes;
use gridforge::backend::BackendKind;
use gridforge::code::{CodeSet, SparseCode};
use gridforge::config::PlacementConfig;
use gridforge::consts::NO_CANDIDATE;
use gridforge::core_types::CandidateSlots;
use gridforge::energy::{swap_delta, total_energy, NeighborScope};
use gridforge::grid::{grid_side, max_useful_radius, CellOccupancy, GridState};
use gridforge::optimizer::{select_batch, NoProgress};
use gridforge::similarity::Gate;
use proptest::prelude::*;
use std::collections::HashSet;

fn code_sets() -> impl Strategy<Value = Vec<SparseCode>> {
    (1usize..40).prop_flat_map(|bits| {
        prop::collection::vec(prop::collection::vec(any::<bool>(), bits), 1..24)
            .prop_map(|rows| rows.iter().map(|r| SparseCode::from_bits(r)).collect::<Vec<_>>())
    })
}

fn shuffled_grid(n: usize, margin: f32, perm_seed: u64) -> GridState {
    let side = grid_side(n, margin).unwrap();
    let mut order: Vec<usize> = (0..side * side).collect();
    fastrand::Rng::with_seed(perm_seed).shuffle(&mut order);
    GridState::with_placement(side, n, &order).unwrap()
}

fn slots_strategy() -> impl Strategy<Value = CandidateSlots> {
    (2usize..64).prop_flat_map(|cells| {
        let entry = (
            prop_oneof![Just(NO_CANDIDATE), (0..cells as u32)],
            -4.0f32..1.0,
        );
        prop::collection::vec(entry, cells).prop_map(|v| {
            let (best, delta): (Vec<u32>, Vec<f32>) = v.into_iter().unzip();
            CandidateSlots { best, delta }
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_placement_keeps_every_code(
        codes in code_sets(),
        seed in any::<u64>(),
        epochs in 0usize..12,
        margin in 0.0f32..1.0,
        local in prop::option::of(1usize..4),
    ) {
        let entries: Vec<(usize, SparseCode)> = codes.iter().cloned().enumerate().collect();
        let config = PlacementConfig {
            epochs,
            seed,
            margin,
            delta_radius: local,
            far_radius: 3,
            ..PlacementConfig::default()
        };
        let placement = place_codes(entries, &config, BackendKind::Sequential, NoProgress).unwrap();

        prop_assert_eq!(placement.entries.len(), codes.len());
        prop_assert!(placement.outcome.epochs <= epochs);

        let cells: HashSet<usize> = placement.entries.iter().map(|e| e.cell).collect();
        prop_assert_eq!(cells.len(), codes.len());
        for e in &placement.entries {
            prop_assert!(e.cell < placement.side * placement.side);
            prop_assert_eq!(&e.code, &codes[e.label]);
        }
    }

    #[test]
    fn prop_selected_batch_is_disjoint(slots in slots_strategy(), budget in 1usize..16) {
        let batch = select_batch(&slots, budget);
        prop_assert!(batch.len() <= budget);
        prop_assert!(batch.validate(slots.len()).is_ok());

        let mut seen = HashSet::new();
        for &(a, b) in batch.pairs() {
            prop_assert!(slots.delta[a as usize] < 0.0);
            prop_assert_eq!(slots.best[a as usize], b);
            prop_assert!(seen.insert(a));
            prop_assert!(seen.insert(b));
        }
    }

    #[test]
    fn prop_swap_delta_matches_energy_difference(
        codes in code_sets(),
        perm_seed in any::<u64>(),
        margin in 0.0f32..0.8,
        lambda in 0.0f32..0.6,
        eta in prop::option::of(1.0f32..30.0),
        pick in any::<(u16, u16)>(),
    ) {
        let set = CodeSet::from_codes(&codes).unwrap();
        let gate = Gate::new(lambda, eta);
        let grid = shuffled_grid(codes.len(), margin, perm_seed);
        let cells = grid.cells().len();
        let (i, j) = (pick.0 as usize % cells, pick.1 as usize % cells);

        let delta = swap_delta(&grid, &set, gate, NeighborScope::LongRange, i, j) as f64;
        let before = total_energy(&grid, &set, gate);
        let mut after_grid = grid.clone();
        after_grid.swap(i, j);
        let after = total_energy(&after_grid, &set, gate);

        let tolerance = 1e-3 * (1.0 + before.abs() + after.abs());
        prop_assert!(
            ((after - before) - delta).abs() <= tolerance,
            "delta {} vs energy change {}", delta, after - before
        );
    }

    #[test]
    fn prop_wide_local_scope_equals_long_range(
        codes in code_sets(),
        perm_seed in any::<u64>(),
        pick in any::<(u16, u16)>(),
    ) {
        let set = CodeSet::from_codes(&codes).unwrap();
        let gate = Gate::new(0.1, None);
        let grid = shuffled_grid(codes.len(), 0.0, perm_seed);
        let cells = grid.cells().len();
        let (i, j) = (pick.0 as usize % cells, pick.1 as usize % cells);
        // A disc of this radius covers the whole grid from any cell.
        let wide = NeighborScope::Local(max_useful_radius(grid.side()));

        let long = swap_delta(&grid, &set, gate, NeighborScope::LongRange, i, j);
        let local = swap_delta(&grid, &set, gate, wide, i, j);
        prop_assert!((long - local).abs() <= 1e-3 * (1.0 + long.abs()));
    }
}
