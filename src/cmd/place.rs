use crate::reports;
use clap::Args;
use gridforge::api::{load_codes_csv, place_codes, save_placement_json};
use gridforge::backend::BackendKind;
use gridforge::config::PlacementConfig;
use gridforge::error::GfResult;
use gridforge::optimizer::{EpochReport, Phase};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct PlaceArgs {
    #[command(flatten)]
    pub config: PlacementConfig,

    /// CSV file with a `label,code` header
    #[arg(short, long)]
    pub input: PathBuf,

    #[arg(short, long, value_enum, default_value_t = BackendKind::Sequential)]
    pub backend: BackendKind,

    /// Write the placement as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn log_progress(report: &EpochReport) {
    if report.phase == Phase::Polish || report.epoch % 25 == 0 {
        info!(
            "[{}] Ep {:4} | lambda {:.3} | swaps {:5}",
            report.phase, report.epoch, report.lambda, report.swaps
        );
    }
}

pub fn run(args: PlaceArgs, config: PlacementConfig) -> GfResult<()> {
    let entries = load_codes_csv(&args.input)?;
    let placement = place_codes(entries, &config, args.backend, log_progress)?;

    reports::print_placement_grid(&placement);
    reports::print_run_summary(&[(args.backend.to_string(), &placement.outcome)]);

    if let Some(path) = &args.output {
        save_placement_json(&placement, path)?;
        info!("Placement written to {}", path.display());
    }
    Ok(())
}
