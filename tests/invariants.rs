mod common;

use common::{clustered_entries, codes_of, small_config, RecordingBackend};
use fastrand::Rng;
use gridforge::code::CodeSet;
use gridforge::config::{PlacementConfig, PolishMode};
use gridforge::consts::NO_CANDIDATE;
use gridforge::energy::swap_delta;
use gridforge::optimizer::{NoProgress, PlacementEngine};
use rstest::rstest;
use std::collections::HashSet;

fn run_recorded(
    config: PlacementConfig,
    seed: u64,
) -> (Vec<common::EpochRecord>, gridforge::optimizer::Placement<String>, CodeSet) {
    let entries = clustered_entries(4, 6, 48, seed);
    let codes = codes_of(&entries);
    let backend = RecordingBackend::new(&codes, &config);
    let log = backend.log.clone();

    let placement =
        PlacementEngine::with_backend(entries, config, Box::new(backend), Rng::with_seed(seed))
            .unwrap()
            .run(NoProgress)
            .unwrap();

    let records = log.lock().unwrap().clone();
    (records, placement, CodeSet::from_codes(&codes).unwrap())
}

#[rstest]
#[case::long_range(small_config())]
#[case::local(PlacementConfig { delta_radius: Some(2), ..small_config() })]
#[case::sampled(PlacementConfig { radius_policy: gridforge::RadiusPolicy::Sampled, ..small_config() })]
#[case::with_margin(PlacementConfig { margin: 0.5, ..small_config() })]
fn test_every_epoch_conserves_codes(#[case] config: PlacementConfig) {
    let (records, placement, set) = run_recorded(config, 17);
    assert!(!records.is_empty());
    for (epoch, r) in records.iter().enumerate() {
        r.before.check_conservation(set.len()).unwrap();
        r.after
            .check_conservation(set.len())
            .unwrap_or_else(|e| panic!("epoch {}: {}", epoch, e));
    }
    assert_eq!(placement.entries.len(), set.len());
}

#[test]
fn test_batches_are_conflict_free() {
    let (records, _, _) = run_recorded(small_config(), 5);
    for r in &records {
        let mut cells = HashSet::new();
        for &(a, b) in &r.batch {
            assert!(cells.insert(a), "cell {} used twice", a);
            assert!(cells.insert(b), "cell {} used twice", b);
        }
    }
}

#[test]
fn test_accepted_swaps_have_negative_delta() {
    let (records, _, set) = run_recorded(small_config(), 23);
    for r in &records {
        for &(a, b) in &r.batch {
            let slot_delta = r.slots.delta[a as usize];
            assert_eq!(r.slots.best[a as usize], b);
            assert!(slot_delta < 0.0);

            let recomputed =
                swap_delta(&r.before, &set, r.params.gate, r.params.scope, a as usize, b as usize);
            assert_eq!(recomputed, slot_delta);
        }
    }
}

#[test]
fn test_batch_respects_budget() {
    let config = PlacementConfig {
        max_batch_frac: 0.1,
        ..small_config()
    };
    let (records, placement, set) = run_recorded(config, 8);
    let budget = ((0.1f64 * set.len() as f64).floor() as usize).max(1);
    for r in &records {
        assert!(r.batch.len() <= budget);
    }
    assert_eq!(
        records.iter().map(|r| r.batch.len()).sum::<usize>(),
        placement.outcome.swaps
    );
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(12)]
fn test_terminates_within_epoch_budget(#[case] epochs: usize) {
    let config = PlacementConfig {
        epochs,
        ..small_config()
    };
    let (records, placement, _) = run_recorded(config, 3);
    assert!(placement.outcome.epochs <= epochs);
    assert!(records.len() <= epochs);
}

#[test]
fn test_only_the_converging_epoch_commits_nothing() {
    let config = PlacementConfig {
        epochs: 200,
        ..small_config()
    };
    let (records, placement, _) = run_recorded(config, 41);
    match placement.outcome.state {
        gridforge::RunState::Converged => {
            assert_eq!(records.len(), placement.outcome.epochs - 1)
        }
        gridforge::RunState::ExhaustedBudget => {
            assert_eq!(records.len(), placement.outcome.epochs)
        }
        other => panic!("non-terminal state {}", other),
    }
}

#[test]
fn test_maximize_polish_accepts_energy_increases() {
    let config = PlacementConfig {
        polish_mode: PolishMode::Maximize,
        polish_epochs: 5,
        ..small_config()
    };
    let (records, placement, set) = run_recorded(config.clone(), 13);
    let polish: Vec<_> = records
        .iter()
        .filter(|r| r.params.epoch as usize >= config.epochs)
        .collect();
    assert!(placement.outcome.polish_state.is_some());

    for r in polish {
        for &(a, b) in &r.batch {
            let raw =
                swap_delta(&r.before, &set, r.params.gate, r.params.scope, a as usize, b as usize);
            assert!(raw > 0.0, "polish swap ({}, {}) has raw delta {}", a, b, raw);
            assert_ne!(r.slots.best[a as usize], NO_CANDIDATE);
        }
    }
}
