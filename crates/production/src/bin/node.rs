//! Citygate Node
//!
//! Runs one arbitration process connected to its peers over TCP.

use anyhow::Context;
use citygate_node::NodeStateMachine;
use citygate_production::{MessageRouter, ProductionConfig, ProductionRunner, TcpTransport};
use citygate_types::ProcessId;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "citygate-node")]
#[command(about = "Run one process of a Citygate group")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Override the local process id
    #[arg(long)]
    process_id: Option<u32>,

    /// Override the tick interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Override the per-tick request probability (0.0 to 1.0)
    #[arg(long)]
    request_probability: Option<f64>,

    /// Override the policy seed
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ProductionConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(id) = cli.process_id {
        config.process_id = ProcessId(id);
    }
    if let Some(tick_ms) = cli.tick_ms {
        config.tick_interval_ms = tick_ms;
    }
    if let Some(probability) = cli.request_probability {
        config.policy = config.policy.with_request_probability(probability);
    }
    if let Some(seed) = cli.seed {
        config.policy = config.policy.with_seed(seed);
    }
    config.validate()?;

    let topology = config.topology()?.into_arc();
    let listen = config
        .listen_address()
        .context("local process has no address")?;

    let transport = TcpTransport::connect(
        config.process_id,
        listen,
        config.peer_addresses(),
        config.connect_timeout(),
    )
    .await?;
    info!(local = %config.process_id, "Connected to every peer");

    let node = NodeStateMachine::new(config.process_id.0, topology.clone(), config.node_config());
    let runner = ProductionRunner::new(node, MessageRouter::new(transport, topology));

    let node = runner
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    info!(
        phase = %node.arbiter().phase(),
        clock = %node.arbiter().clock(),
        "Stopped"
    );
    Ok(())
}
