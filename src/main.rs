use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use gridforge::config::PlacementConfig;
use gridforge::error::GfResult;
use std::process;
use tracing::{error, info, Level};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about = "Similarity-driven grid placement of sparse codes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file. Flags given on the command line win.
    #[arg(global = true, long = "config")]
    config_file: Option<String>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Place the codes of a CSV file on a grid
    Place(cmd::place::PlaceArgs),
    /// Run both backends on the same input and compare
    Compare(cmd::compare::CompareArgs),
}

fn resolve_config(
    file: Option<&str>,
    cli_config: &PlacementConfig,
    sub_matches: Option<&ArgMatches>,
) -> GfResult<PlacementConfig> {
    let config = match (file, sub_matches) {
        (Some(path), Some(sub)) => {
            info!("Loading configuration from {}", path);
            let mut from_file = PlacementConfig::load_from_file(path)?;
            from_file.merge_from_cli(cli_config, sub);
            from_file
        }
        (Some(path), None) => {
            info!("Loading configuration from {}", path);
            PlacementConfig::load_from_file(path)?
        }
        (None, _) => cli_config.clone(),
    };
    config.validate()?;
    Ok(config)
}

fn main() {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let (cli_config, sub_matches) = match &cli.command {
        Commands::Place(args) => (&args.config, matches.subcommand_matches("place")),
        Commands::Compare(args) => (&args.config, matches.subcommand_matches("compare")),
    };

    let config = resolve_config(cli.config_file.as_deref(), cli_config, sub_matches)
        .unwrap_or_else(|e| {
            error!("{}", e);
            process::exit(1);
        });

    let result = match cli.command {
        Commands::Place(args) => cmd::place::run(args, config),
        Commands::Compare(args) => cmd::compare::run(args, config),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}
