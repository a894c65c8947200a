mod config;

use clap::Parser;
use config::ScenarioConfig;
use evsim_engine::full_power_actions;
use std::path::PathBuf;

/// Command line arguments for the evsim runner
#[derive(Parser, Debug)]
#[command(name = "evsim")]
#[command(about = "EV charging station simulator")]
struct Args {
    /// Path to the scenario JSON file
    #[arg(short, long)]
    config: PathBuf,

    /// Log every station step
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let scenario = ScenarioConfig::load(&args.config)?;
    tracing::info!(
        "Loaded scenario from {}: {} stations, {} arrivals",
        args.config.display(),
        scenario.stations.len(),
        scenario.arrivals.len()
    );

    let mut engine = scenario.into_engine(args.verbose)?;

    let mut profit = 0.0;
    let mut invalid_actions = 0;
    while !engine.is_done() {
        let actions: Vec<Vec<f64>> = engine.stations().iter().map(full_power_actions).collect();
        let report = engine.step(&actions)?;
        profit += report.profit;
        invalid_actions += report.invalid_actions;
    }

    for station in engine.stations() {
        println!("{station}");
    }
    tracing::info!(
        "Finished after {} steps: profit {:.2}, {} invalid actions, {} rejected arrivals",
        engine.current_step(),
        profit,
        invalid_actions,
        engine.rejected_arrivals()
    );

    Ok(())
}
