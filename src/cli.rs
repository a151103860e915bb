use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;

#[derive(Parser)]
#[command(name = "pricestruct")]
#[command(about = "Market-structure context builder", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a context snapshot from an input document
    Build {
        /// Ticker symbol the snapshot is labelled with
        #[arg(short, long)]
        symbol: String,

        /// Path to the input JSON document
        #[arg(short, long)]
        input: PathBuf,

        /// Comma-separated module list, e.g. "core,vpvr,smc" or "all"
        #[arg(short, long, default_value = "core")]
        modules: String,

        /// Write the snapshot here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fractal swing pivot width (bars on each side)
        #[arg(long, default_value_t = crate::constants::SWING_PIVOT_WIDTH)]
        swing_n: usize,
    },
}

pub fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { symbol, input, modules, output, swing_n } => {
            commands::build::run(&symbol, &input, &modules, swing_n, output.as_deref());
        }
    }
}
