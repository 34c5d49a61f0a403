use crate::consts::{DEFAULT_FAR_RADIUS, DEFAULT_POLISH_RADIUS, MAX_MARGIN};
use crate::error::{GfResult, GridForgeError};
use clap::{parser::ValueSource, ArgMatches, Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::warn;

/// How the per-cell candidate search radius is chosen.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RadiusPolicy {
    /// Every search uses `far_radius`.
    #[default]
    Fixed,
    /// Each search draws a radius in `[1, far_radius]`.
    Sampled,
}

/// Optional short-range pass after the main loop.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PolishMode {
    #[default]
    Off,
    Minimize,
    /// Accepts swaps that increase local energy.
    Maximize,
}

#[derive(Args, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Candidate search radius in cells.
    #[arg(long, default_value_t = DEFAULT_FAR_RADIUS)]
    pub far_radius: usize,
    /// Maximum number of main-loop epochs.
    #[arg(long, default_value_t = 200)]
    pub epochs: usize,
    /// Raw similarity two occupied cells need before a swap is considered.
    #[arg(long, default_value_t = 0.0)]
    pub min_sim: f32,
    #[arg(long, default_value_t = 0.0)]
    pub lambda_start: f32,
    #[arg(long, default_value_t = 0.3)]
    pub lambda_end: f32,
    /// Gate steepness. Absent means a hard threshold.
    #[arg(long)]
    pub eta: Option<f32>,
    /// Fraction of occupied cells that may swap per epoch.
    #[arg(long, default_value_t = 0.2)]
    pub max_batch_frac: f32,
    /// Bound the energy neighborhood. Absent means long-range energy.
    #[arg(long)]
    pub delta_radius: Option<usize>,

    // === GRID ===
    /// Extra empty slack as a fraction of the code count.
    #[arg(long, default_value_t = 0.0)]
    pub margin: f32,
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub shuffle_initial: bool,

    // === EXECUTION ===
    #[arg(long, default_value_t = false)]
    pub similarity_cache: bool,
    #[arg(long, value_enum, default_value_t = RadiusPolicy::Fixed)]
    pub radius_policy: RadiusPolicy,
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub parallel_scan: bool,
    /// Device worker threads (0 = all cores).
    #[arg(long, default_value_t = 0)]
    pub device_threads: usize,

    // === POLISH ===
    #[arg(long, value_enum, default_value_t = PolishMode::Off)]
    pub polish_mode: PolishMode,
    #[arg(long, default_value_t = 20)]
    pub polish_epochs: usize,
    #[arg(long, default_value_t = DEFAULT_POLISH_RADIUS)]
    pub polish_radius: usize,

    // === REPORTING ===
    #[arg(long, default_value_t = false)]
    pub track_energy: bool,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            far_radius: DEFAULT_FAR_RADIUS,
            epochs: 200,
            min_sim: 0.0,
            lambda_start: 0.0,
            lambda_end: 0.3,
            eta: None,
            max_batch_frac: 0.2,
            delta_radius: None,
            margin: 0.0,
            shuffle_initial: true,
            similarity_cache: false,
            radius_policy: RadiusPolicy::Fixed,
            parallel_scan: true,
            device_threads: 0,
            polish_mode: PolishMode::Off,
            polish_epochs: 20,
            polish_radius: DEFAULT_POLISH_RADIUS,
            track_energy: false,
            seed: 42,
        }
    }
}

fn check_unit(name: &str, value: f32) -> GfResult<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(GridForgeError::Config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

impl PlacementConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> GfResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> GfResult<()> {
        if self.far_radius == 0 {
            return Err(GridForgeError::Config(
                "far_radius must be at least 1".to_string(),
            ));
        }
        check_unit("min_sim", self.min_sim)?;
        check_unit("lambda_start", self.lambda_start)?;
        check_unit("lambda_end", self.lambda_end)?;

        if !self.max_batch_frac.is_finite()
            || self.max_batch_frac <= 0.0
            || self.max_batch_frac > 1.0
        {
            return Err(GridForgeError::Config(format!(
                "max_batch_frac must be within (0, 1], got {}",
                self.max_batch_frac
            )));
        }

        match self.eta {
            Some(eta) if !eta.is_finite() || eta < 0.0 => {
                return Err(GridForgeError::Config(format!(
                    "eta must be a finite non-negative number, got {}",
                    eta
                )));
            }
            Some(eta) if eta == 0.0 => {
                warn!("eta = 0 disables the threshold: every weight becomes x/2");
            }
            _ => {}
        }

        if self.delta_radius == Some(0) {
            return Err(GridForgeError::Config(
                "delta_radius must be at least 1 when set".to_string(),
            ));
        }
        if !self.margin.is_finite() || !(0.0..=MAX_MARGIN).contains(&self.margin) {
            return Err(GridForgeError::Config(format!(
                "margin must be within [0, {}], got {}",
                MAX_MARGIN, self.margin
            )));
        }
        if self.polish_mode != PolishMode::Off && self.polish_radius == 0 {
            return Err(GridForgeError::Config(
                "polish_radius must be at least 1".to_string(),
            ));
        }
        let polish_epochs = match self.polish_mode {
            PolishMode::Off => 0,
            _ => self.polish_epochs,
        };
        match self.epochs.checked_add(polish_epochs) {
            Some(total) if total <= u32::MAX as usize => {}
            _ => {
                return Err(GridForgeError::Config(format!(
                    "epochs + polish_epochs must not exceed {}, got {} + {}",
                    u32::MAX,
                    self.epochs,
                    polish_epochs
                )));
            }
        }
        Ok(())
    }

    pub fn merge_from_cli(&mut self, cli: &PlacementConfig, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($field:ident, $arg_name:expr) => {
                if matches.value_source($arg_name) == Some(ValueSource::CommandLine) {
                    self.$field = cli.$field.clone();
                }
            };
        }

        update_if_present!(far_radius, "far_radius");
        update_if_present!(epochs, "epochs");
        update_if_present!(min_sim, "min_sim");
        update_if_present!(lambda_start, "lambda_start");
        update_if_present!(lambda_end, "lambda_end");
        update_if_present!(eta, "eta");
        update_if_present!(max_batch_frac, "max_batch_frac");
        update_if_present!(delta_radius, "delta_radius");

        update_if_present!(margin, "margin");
        update_if_present!(shuffle_initial, "shuffle_initial");

        update_if_present!(similarity_cache, "similarity_cache");
        update_if_present!(radius_policy, "radius_policy");
        update_if_present!(parallel_scan, "parallel_scan");
        update_if_present!(device_threads, "device_threads");

        update_if_present!(polish_mode, "polish_mode");
        update_if_present!(polish_epochs, "polish_epochs");
        update_if_present!(polish_radius, "polish_radius");

        update_if_present!(track_energy, "track_energy");
        update_if_present!(seed, "seed");
    }
}
