//! Command line entry point for the canopy simulator.
//!
//! Reads a scenario file, constructs the spanning tree, runs the
//! scheduled data broadcasts, writes `output/log.txt` and prints the
//! final per-node tree listing.

mod input;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;

use canopy_network::Network;

const LOG_PATH: &str = "output/log.txt";
const USAGE_EXIT_CODE: u8 = 42;

/// Deterministic spanning-tree construction and data dissemination over
/// range-limited radio nodes.
#[derive(Parser, Debug)]
#[command(name = "canopy", version)]
struct Cli {
    /// Scenario file with node placements, broadcasts and the energy floor
    filepath: PathBuf,
    /// Uniform radio range applied to every node
    range: f32,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(USAGE_EXIT_CODE),
            };
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let scenario = input::load(&cli.filepath)
        .with_context(|| format!("loading scenario {}", cli.filepath.display()))?;
    tracing::info!(
        nodes = scenario.nodes.len(),
        broadcasts = scenario.broadcasts.len(),
        range = cli.range,
        "Scenario loaded"
    );

    let mut network = Network::new(scenario.min_energy);
    for spec in &scenario.nodes {
        network.add_node(spec.id, spec.position, spec.energy, cli.range);
    }
    for &origin in &scenario.broadcasts {
        network.add_broadcast(origin);
    }

    network.discover()?;
    network.build_mst()?;
    network.execute_transmissions()?;

    report::write_log(network.events(), Path::new(LOG_PATH))
        .with_context(|| format!("writing {LOG_PATH}"))?;
    print!("{}", report::tree_summary(&network));
    Ok(())
}
