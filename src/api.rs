use crate::backend::BackendKind;
use crate::code::SparseCode;
use crate::config::PlacementConfig;
use crate::error::{GfResult, GridForgeError};
use crate::optimizer::{NoProgress, Placement, PlacementEngine, ProgressCallback};
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct CodeRow {
    label: String,
    code: String,
}

/// Reads `label,code` rows, `code` being a string of `0`/`1`.
pub fn load_codes_csv<P: AsRef<Path>>(path: P) -> GfResult<Vec<(String, SparseCode)>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut entries = Vec::new();
    for (line, row) in reader.deserialize::<CodeRow>().enumerate() {
        let row = row?;
        let code: SparseCode = row.code.parse().map_err(|e| {
            GridForgeError::Validation(format!("{} row {}: {}", path.display(), line + 1, e))
        })?;
        entries.push((row.label, code));
    }
    info!("Loaded {} codes from {}", entries.len(), path.display());
    Ok(entries)
}

pub fn save_placement_json<L: Serialize, P: AsRef<Path>>(
    placement: &Placement<L>,
    path: P,
) -> GfResult<()> {
    let json = serde_json::to_string_pretty(placement)?;
    fs::write(path, json)?;
    Ok(())
}

/// One-shot placement seeded from `config.seed`.
pub fn place_codes<L, CB: ProgressCallback>(
    entries: Vec<(L, SparseCode)>,
    config: &PlacementConfig,
    backend: BackendKind,
    callback: CB,
) -> GfResult<Placement<L>> {
    let engine = PlacementEngine::new(
        entries,
        config.clone(),
        backend,
        Rng::with_seed(config.seed),
    )?;
    engine.run(callback)
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendComparison<L> {
    pub sequential: Placement<L>,
    pub parallel: Placement<L>,
    /// Both backends put every code into the same cell.
    pub identical: bool,
}

/// Runs both backends on the same input and seed.
pub fn compare_backends<L: Clone>(
    entries: Vec<(L, SparseCode)>,
    config: &PlacementConfig,
) -> GfResult<BackendComparison<L>> {
    let sequential = place_codes(entries.clone(), config, BackendKind::Sequential, NoProgress)?;
    let parallel = place_codes(entries, config, BackendKind::Parallel, NoProgress)?;

    let identical = sequential.entries.len() == parallel.entries.len()
        && sequential
            .entries
            .iter()
            .zip(parallel.entries.iter())
            .all(|(a, b)| a.cell == b.cell && a.code == b.code);

    Ok(BackendComparison {
        sequential,
        parallel,
        identical,
    })
}
