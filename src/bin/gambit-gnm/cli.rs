//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;

/// Compute Nash equilibria of a strategic-form game with the Global Newton Method
#[derive(Parser)]
#[command(name = "gambit-gnm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Game in .nfg format (reads stdin when omitted)
    pub file: Option<PathBuf>,

    /// Number of random perturbations to start paths from
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: u64,

    /// Seed for the random perturbations
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Read perturbations from a file, one comma-separated vector per line
    #[arg(short, long)]
    pub perturbations: Option<PathBuf>,

    /// Decimal places in printed probabilities
    #[arg(short, long, default_value_t = 6)]
    pub decimals: usize,

    /// Solver configuration file (TOML)
    #[arg(short, long, env = "GAMBIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print path-following progress
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress the banner
    #[arg(short, long)]
    pub quiet: bool,
}
