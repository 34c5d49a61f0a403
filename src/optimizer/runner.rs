use crate::backend::{create_backend, BackendKind, PlacementBackend};
use crate::code::{CodeSet, SparseCode};
use crate::config::{PlacementConfig, PolishMode};
use crate::energy::{total_energy, EpochParams, NeighborScope, Objective};
use crate::error::{GfResult, GridForgeError};
use crate::grid::{CellOccupancy, GridState};
use crate::optimizer::batch::{batch_budget, select_batch};
use crate::optimizer::initialization::build_initial_grid;
use crate::similarity::{Gate, ThresholdSchedule};
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, info};
use typed_builder::TypedBuilder;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Initializing,
    RunningEpoch,
    Converged,
    ExhaustedBudget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Main,
    Polish,
}

/// Emitted once per completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochReport {
    pub phase: Phase,
    /// Epoch index within its phase.
    pub epoch: usize,
    pub lambda: f32,
    pub swaps: usize,
    /// Most negative candidate delta of the scan, if any cell had a partner.
    pub best_delta: Option<f32>,
}

/// Observer of epoch progress. It cannot stop a run.
pub trait ProgressCallback {
    fn on_epoch(&self, report: &EpochReport);
}

impl<F: Fn(&EpochReport)> ProgressCallback for F {
    fn on_epoch(&self, report: &EpochReport) {
        self(report)
    }
}

/// Callback that ignores every report.
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_epoch(&self, _report: &EpochReport) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub backend: BackendKind,
    pub state: RunState,
    pub epochs: usize,
    pub swaps: usize,
    /// Terminal state of the polish phase, when it ran.
    pub polish_state: Option<RunState>,
    pub polish_epochs: usize,
    pub polish_swaps: usize,
    pub initial_energy: Option<f64>,
    pub final_energy: Option<f64>,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedEntry<L> {
    pub label: L,
    pub code: SparseCode,
    pub row: usize,
    pub col: usize,
    pub cell: usize,
}

/// Final readout: occupied cells in row-major order with labels re-attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement<L> {
    pub side: usize,
    pub entries: Vec<PlacedEntry<L>>,
    pub outcome: RunOutcome,
}

#[derive(TypedBuilder)]
pub struct EngineBuildParams<L> {
    pub entries: Vec<(L, SparseCode)>,
    #[builder(default)]
    pub config: PlacementConfig,
    #[builder(default)]
    pub backend: BackendKind,
    #[builder(default = Rng::with_seed(config.seed))]
    pub rng: Rng,
}

impl<L> EngineBuildParams<L> {
    pub fn build_engine(self) -> GfResult<PlacementEngine<L>> {
        PlacementEngine::new(self.entries, self.config, self.backend, self.rng)
    }
}

struct PhaseResult {
    state: RunState,
    epochs: usize,
    swaps: usize,
}

pub struct PlacementEngine<L> {
    labels: Vec<L>,
    codes: Vec<SparseCode>,
    set: Arc<CodeSet>,
    config: PlacementConfig,
    backend: Box<dyn PlacementBackend>,
    initial: GridState,
    radius_seed: u64,
    state: RunState,
}

impl<L> PlacementEngine<L> {
    pub fn new(
        entries: Vec<(L, SparseCode)>,
        config: PlacementConfig,
        kind: BackendKind,
        rng: Rng,
    ) -> GfResult<Self> {
        config.validate()?;
        let (labels, codes): (Vec<L>, Vec<SparseCode>) = entries.into_iter().unzip();
        let set = Arc::new(CodeSet::from_codes(&codes)?);
        let backend = create_backend(kind, set.clone(), &config)?;
        Self::assemble(labels, codes, set, config, backend, rng)
    }

    /// Uses a caller-supplied backend instead of one built from a kind.
    pub fn with_backend(
        entries: Vec<(L, SparseCode)>,
        config: PlacementConfig,
        backend: Box<dyn PlacementBackend>,
        rng: Rng,
    ) -> GfResult<Self> {
        config.validate()?;
        let (labels, codes): (Vec<L>, Vec<SparseCode>) = entries.into_iter().unzip();
        let set = Arc::new(CodeSet::from_codes(&codes)?);
        Self::assemble(labels, codes, set, config, backend, rng)
    }

    fn assemble(
        labels: Vec<L>,
        codes: Vec<SparseCode>,
        set: Arc<CodeSet>,
        config: PlacementConfig,
        mut backend: Box<dyn PlacementBackend>,
        mut rng: Rng,
    ) -> GfResult<Self> {
        let initial = build_initial_grid(set.len(), config.margin, config.shuffle_initial, &mut rng)?;
        let radius_seed = rng.u64(..);
        backend.upload_state(&initial)?;

        info!(
            "Engine ready: {} codes of {} bits on a {}x{} grid ({} backend)",
            set.len(),
            set.bit_len(),
            initial.side(),
            initial.side(),
            backend.kind()
        );

        Ok(Self {
            labels,
            codes,
            set,
            config,
            backend,
            initial,
            radius_seed,
            state: RunState::Initializing,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn side(&self) -> usize {
        self.initial.side()
    }

    pub fn initial_grid(&self) -> &GridState {
        &self.initial
    }

    /// Releases the backend without running.
    pub fn dispose(mut self) {
        self.backend.release();
    }

    fn run_phase<CB: ProgressCallback>(
        &mut self,
        phase: Phase,
        max_epochs: usize,
        epoch_offset: usize,
        budget: usize,
        params_for: impl Fn(usize, u32) -> EpochParams,
        callback: &CB,
    ) -> GfResult<PhaseResult> {
        let mut result = PhaseResult {
            state: RunState::ExhaustedBudget,
            epochs: 0,
            swaps: 0,
        };

        for epoch in 0..max_epochs {
            let global = epoch_offset
                .checked_add(epoch)
                .and_then(|e| u32::try_from(e).ok())
                .ok_or_else(|| {
                    GridForgeError::Config(format!(
                        "epoch counter {} + {} does not fit in 32 bits",
                        epoch_offset, epoch
                    ))
                })?;
            let params = params_for(epoch, global);
            let slots = self.backend.find_best_candidates(&params)?;
            let batch = select_batch(&slots, budget);

            let report = EpochReport {
                phase,
                epoch,
                lambda: params.gate.lambda,
                swaps: batch.len(),
                best_delta: slots.best_delta(),
            };
            debug!(
                "[{}] epoch {} lambda {:.4} swaps {} best delta {:?}",
                report.phase, report.epoch, report.lambda, report.swaps, report.best_delta
            );

            result.epochs += 1;
            if batch.is_empty() {
                callback.on_epoch(&report);
                result.state = RunState::Converged;
                break;
            }

            self.backend.apply_batch(&batch)?;
            result.swaps += batch.len();
            callback.on_epoch(&report);
        }

        Ok(result)
    }

    /// Runs the main loop and the optional polish phase, then downloads the
    /// grid once and reads it out.
    pub fn run<CB: ProgressCallback>(mut self, callback: CB) -> GfResult<Placement<L>> {
        let start = Instant::now();
        let cfg = self.config.clone();
        let n = self.set.len();
        let budget = batch_budget(cfg.max_batch_frac, n);
        let final_gate = Gate::new(cfg.lambda_end, cfg.eta);

        let initial_energy = cfg
            .track_energy
            .then(|| total_energy(&self.initial, self.set.as_ref(), final_gate));

        self.state = RunState::RunningEpoch;
        let schedule = ThresholdSchedule::new(cfg.lambda_start, cfg.lambda_end, cfg.epochs);
        let scope = NeighborScope::from_radius(cfg.delta_radius);
        let seed = self.radius_seed;

        let main = self.run_phase(
            Phase::Main,
            cfg.epochs,
            0,
            budget,
            |epoch, global| EpochParams {
                epoch: global,
                gate: Gate::new(schedule.lambda(epoch), cfg.eta),
                min_sim: cfg.min_sim,
                search_radius: cfg.far_radius,
                radius_policy: cfg.radius_policy,
                seed,
                scope,
                objective: Objective::Minimize,
            },
            &callback,
        )?;
        self.state = main.state;
        info!(
            "Main phase {} after {} epochs ({} swaps)",
            main.state, main.epochs, main.swaps
        );

        let polish_objective = match cfg.polish_mode {
            PolishMode::Off => None,
            PolishMode::Minimize => Some(Objective::Minimize),
            PolishMode::Maximize => Some(Objective::Maximize),
        };

        let polish = match polish_objective {
            Some(objective) => {
                let result = self.run_phase(
                    Phase::Polish,
                    cfg.polish_epochs,
                    cfg.epochs,
                    budget,
                    |_, global| EpochParams {
                        epoch: global,
                        gate: final_gate,
                        min_sim: cfg.min_sim,
                        search_radius: cfg.polish_radius,
                        radius_policy: cfg.radius_policy,
                        seed,
                        scope: NeighborScope::Local(cfg.polish_radius),
                        objective,
                    },
                    &callback,
                )?;
                info!(
                    "Polish ({}) {} after {} epochs ({} swaps)",
                    cfg.polish_mode, result.state, result.epochs, result.swaps
                );
                Some(result)
            }
            None => None,
        };

        let grid = self.backend.download_state()?;
        grid.check_conservation(n)?;
        self.backend.release();

        let final_energy = cfg
            .track_energy
            .then(|| total_energy(&grid, self.set.as_ref(), final_gate));

        let outcome = RunOutcome {
            backend: self.backend.kind(),
            state: main.state,
            epochs: main.epochs,
            swaps: main.swaps,
            polish_state: polish.as_ref().map(|p| p.state),
            polish_epochs: polish.as_ref().map_or(0, |p| p.epochs),
            polish_swaps: polish.as_ref().map_or(0, |p| p.swaps),
            initial_energy,
            final_energy,
            elapsed_secs: start.elapsed().as_secs_f64(),
        };

        let mut labels: Vec<Option<L>> = self.labels.into_iter().map(Some).collect();
        let mut entries = Vec::with_capacity(n);
        for (cell, row, col, code) in grid.row_major() {
            let idx = code as usize;
            if let Some(label) = labels[idx].take() {
                entries.push(PlacedEntry {
                    label,
                    code: self.codes[idx].clone(),
                    row,
                    col,
                    cell,
                });
            }
        }

        Ok(Placement {
            side: grid.side(),
            entries,
            outcome,
        })
    }
}
