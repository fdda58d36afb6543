//! Switchboard Routing Authority - Main Entry Point

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use switchboard_authority::Authority;
use switchboard_common::telemetry::init_tracing;
use switchboard_common::{SwitchboardConfig, METRICS};
use tokio::signal;
use tracing::{debug, info};

#[derive(Parser)]
#[command(
    name = "switchboard-authority",
    version,
    about = "Routes chat clients to idle workers"
)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Rendezvous port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = SwitchboardConfig::load(cli.config.as_deref(), "authority")?;
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    init_tracing("switchboard_authority", config.log_level());
    info!("Starting Switchboard routing authority");

    let addr = config.socket_addr()?;

    let mut authority = Authority::bind(addr, config.coordinator()?)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = authority.serve() => {
            result?;
        }
    }

    debug!("Final metrics:\n{}", METRICS.gather());
    info!("Routing authority shutdown complete");
    Ok(())
}
