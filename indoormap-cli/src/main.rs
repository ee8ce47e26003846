//! Indoormap CLI - Command-line interface
//!
//! Inspect indoor datasets, print level filters and layer sets, and run a
//! catalog cycle against a headless map.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{filter, inspect, layers, stream};
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "indoormap", version, about = "Indoor map datasets and catalogs")]
struct Cli {
    /// Configuration file (defaults to <config dir>/indoormap/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show a dataset's level range, bounds and starting level
    Inspect {
        /// GeoJSON dataset
        file: PathBuf,
    },

    /// Print the level filter a layer gets for a given level
    Filter {
        /// Level to show
        #[arg(long, allow_negative_numbers = true)]
        level: f64,

        /// Also show features without a level tag
        #[arg(long)]
        show_empty: bool,

        /// Layer's own filter as JSON (e.g. '["==", "indoor", "room"]')
        #[arg(long)]
        base: Option<String>,
    },

    /// List the bundled indoor layers
    Layers,

    /// Run one catalog cycle for a viewport and show what gets selected
    Stream {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        #[arg(long, default_value_t = 18.0)]
        zoom: f64,

        /// Half the viewport's width and height, in meters
        #[arg(long, default_value_t = stream::DEFAULT_SPAN_M)]
        span_m: f64,

        /// Catalog server URL (overrides [catalog] server_url)
        #[arg(long)]
        server: Option<String>,
    },
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Inspect { file } => inspect::run(config_path, &file),
        Commands::Filter {
            level,
            show_empty,
            base,
        } => filter::run(level, show_empty, base.as_deref()),
        Commands::Layers => layers::run(),
        Commands::Stream {
            lat,
            lon,
            zoom,
            span_m,
            server,
        } => stream::run(
            config_path,
            stream::StreamArgs {
                lat,
                lon,
                zoom,
                span_m,
                server,
            },
        ),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
