//! Citygate Simulator CLI
//!
//! Runs a deterministic contention simulation and prints a report.

use citygate_simulator::{Simulator, SimulatorConfig};
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "citygate-sim")]
#[command(about = "Simulate N processes sharing M cities")]
#[command(version)]
struct Cli {
    /// Number of processes
    #[arg(short = 'n', long, default_value = "5")]
    processes: u32,

    /// Number of cities
    #[arg(short = 'm', long, default_value = "2")]
    cities: u32,

    /// Simulated duration (e.g., "30s", "10m", "1h")
    #[arg(short, long, default_value = "10m")]
    duration: humantime::Duration,

    /// Probability of requesting a city on an idle tick (0.0 to 1.0)
    #[arg(long, default_value = "0.1")]
    request_probability: f64,

    /// Tick interval in milliseconds
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Minimum one-way latency in milliseconds
    #[arg(long, default_value = "5")]
    min_latency_ms: u64,

    /// Maximum one-way latency in milliseconds
    #[arg(long, default_value = "50")]
    max_latency_ms: u64,

    /// Bound each deferred queue (unbounded by default)
    #[arg(long)]
    max_deferred: Option<usize>,

    /// Random seed
    #[arg(long, default_value = "12345")]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let mut config = SimulatorConfig::new(cli.processes, cli.cities)
        .with_request_probability(cli.request_probability)
        .with_tick_interval(Duration::from_millis(cli.tick_ms))
        .with_latency(
            Duration::from_millis(cli.min_latency_ms),
            Duration::from_millis(cli.max_latency_ms),
        )
        .with_seed(cli.seed);
    if let Some(capacity) = cli.max_deferred {
        config = config.with_deferred_capacity(capacity);
    }

    let mut simulator = Simulator::new(config)?;
    println!(
        "Simulating {} processes over {} cities for {:?}...",
        cli.processes, cli.cities, *cli.duration
    );
    let report = simulator.run_for(*cli.duration);
    report.print();

    if report.violations > 0 {
        anyhow::bail!("{} mutual exclusion violations", report.violations);
    }
    Ok(())
}
