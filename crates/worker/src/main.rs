//! Switchboard Worker - Main Entry Point
//!
//! Binds the client-facing port given on the command line, registers with the
//! routing authority and serves echo sessions one client at a time.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use switchboard_common::telemetry::init_tracing;
use switchboard_common::{SwitchboardConfig, METRICS};
use switchboard_worker::Worker;
use tokio::signal;
use tracing::{debug, info};

#[derive(Parser)]
#[command(
    name = "switchboard-worker",
    version,
    about = "Serves one chat client at a time behind the routing authority"
)]
struct Cli {
    /// Port clients connect to
    port: u16,

    /// YAML configuration file
    #[arg(short, long, env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Routing authority address (host:port)
    #[arg(short, long)]
    authority: Option<String>,

    /// Address to bind the client-facing port on
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = SwitchboardConfig::load(cli.config.as_deref(), "worker")?;
    config.port = cli.port;
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    let authority = match cli.authority {
        Some(authority) => authority,
        None => config.worker()?.authority_address.clone(),
    };

    init_tracing("switchboard_worker", config.log_level());
    info!("Starting Switchboard worker on port {}", config.port);

    let bind = config.socket_addr()?;

    let worker = Worker::start(&authority, bind)
        .await
        .context("worker failed to start")?;

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = worker.run() => {
            result?;
        }
    }

    debug!("Final metrics:\n{}", METRICS.gather());
    info!("Switchboard worker shutdown complete");
    Ok(())
}
