//! gambit-gnm - Nash equilibria by the Global Newton Method

use std::io::{self, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use gambit::nfg::{self, lexer::parse_number};
use gambit::solver::CsvRenderer;
use gambit::{random_perturbations, Config, GnmSolver, MixedProfile, TableGame};

mod cli;

use cli::Cli;

const DEFAULT_CONFIG: &str = "gambit.toml";

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("gambit=debug")
    } else {
        EnvFilter::new("gambit=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(Path::new(DEFAULT_CONFIG)),
    };
    let solver = GnmSolver::new(config.gnm)?;

    let game = read_game(cli.file.as_deref())?;

    if !cli.quiet {
        eprintln!(
            "gambit-gnm {}: Nash equilibria by the Global Newton Method",
            env!("CARGO_PKG_VERSION")
        );
    }

    let perturbations = match &cli.perturbations {
        Some(path) => read_perturbations(&game, path)?,
        None => {
            let mut rng = match cli.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            random_perturbations(&game, cli.count as usize, &mut rng)
        }
    };

    let stdout = io::stdout();
    let mut renderer = CsvRenderer::new(stdout.lock(), cli.decimals);
    solver
        .solve_many(&game, &perturbations, &mut renderer)
        .context("equilibrium computation failed")?;

    Ok(())
}

fn read_game(file: Option<&Path>) -> Result<TableGame> {
    match file {
        Some(path) => nfg::read_file(path)
            .with_context(|| format!("failed to read game from {}", path.display())),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read game from stdin")?;
            nfg::parse(&text).context("failed to read game from stdin")
        }
    }
}

fn read_perturbations<'g>(game: &'g TableGame, path: &Path) -> Result<Vec<MixedProfile<'g>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read perturbations: {}", path.display()))?;

    let mut perturbations = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut values = Vec::new();
        for field in line.split(',') {
            let field = field.trim();
            let Some(value) = parse_number(field) else {
                bail!("{}:{}: invalid number `{}`", path.display(), i + 1, field);
            };
            values.push(value);
        }
        let profile = MixedProfile::from_vec(game, values)
            .with_context(|| format!("{}:{}: bad perturbation", path.display(), i + 1))?;
        perturbations.push(profile);
    }

    if perturbations.is_empty() {
        bail!("no perturbations in {}", path.display());
    }
    Ok(perturbations)
}
