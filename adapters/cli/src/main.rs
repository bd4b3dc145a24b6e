#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless Ooze Defence supply simulation.

mod scenario;
mod simulation;

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::info;

use crate::{scenario::Scenario, simulation::Simulation};

/// Command-line arguments accepted by the simulation driver.
#[derive(Debug, Parser)]
#[command(name = "ooze-defence", about = "Simulates packet supply across a building network")]
struct CliArgs {
    /// Scenario file describing the buildings to place.
    #[arg(long, value_name = "FILE")]
    scenario: Option<PathBuf>,
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 600)]
    ticks: u32,
    /// Simulated milliseconds per tick.
    #[arg(long = "dt-ms", value_name = "MS", default_value_t = 100)]
    dt_ms: u64,
    /// Seed for the random number generator.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Probability per tick of destroying a random non-source building.
    #[arg(long, value_name = "P", default_value_t = 0.0)]
    chaos: f64,
}

/// Entry point for the Ooze Defence command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = CliArgs::parse();
    ensure!(
        (0.0..=1.0).contains(&args.chaos),
        "--chaos must lie between 0 and 1, got {}",
        args.chaos
    );
    ensure!(args.dt_ms > 0, "--dt-ms must be positive");

    let scenario = load_scenario(args.scenario.as_ref())?;
    info!(
        "running {} tick(s) over {} building(s)",
        args.ticks,
        scenario.building_count()
    );

    let mut simulation = Simulation::new(&scenario, args.seed, args.chaos);
    let dt = Duration::from_millis(args.dt_ms);
    for _ in 0..args.ticks {
        simulation.step(dt);
    }

    println!("{}", simulation.summary());
    Ok(())
}

fn load_scenario(path: Option<&PathBuf>) -> Result<Scenario> {
    let Some(path) = path else {
        return Scenario::built_in().context("built-in scenario is invalid");
    };

    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    Scenario::from_toml_str(&source)
        .with_context(|| format!("invalid scenario {}", path.display()))
}
