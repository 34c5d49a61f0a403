use crate::reports;
use clap::Args;
use gridforge::api::{compare_backends, load_codes_csv};
use gridforge::config::PlacementConfig;
use gridforge::error::GfResult;
use std::path::PathBuf;
use tracing::warn;

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub config: PlacementConfig,

    /// CSV file with a `label,code` header
    #[arg(short, long)]
    pub input: PathBuf,
}

pub fn run(args: CompareArgs, config: PlacementConfig) -> GfResult<()> {
    let entries = load_codes_csv(&args.input)?;
    let cmp = compare_backends(entries, &config)?;

    reports::print_run_summary(&[
        ("sequential".to_string(), &cmp.sequential.outcome),
        ("parallel".to_string(), &cmp.parallel.outcome),
    ]);
    println!(
        "Backends agree: {}",
        if cmp.identical { "yes" } else { "no" }
    );
    if !cmp.identical {
        warn!("Sequential and parallel placements differ");
    }
    Ok(())
}
