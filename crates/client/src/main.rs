//! Switchboard Client - Main Entry Point
//!
//! Requests a worker from the routing authority and chats with it from stdin.
//! `quit` or `exit` ends the session.

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use switchboard_client::{request_assignment, Assignment, ChatSession};
use switchboard_common::telemetry::init_tracing;
use switchboard_common::SwitchboardConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "switchboard-client",
    version,
    about = "Chat with whichever worker the routing authority assigns"
)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Routing authority address (host:port)
    #[arg(short, long)]
    authority: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = SwitchboardConfig::load(cli.config.as_deref(), "client")?;
    let authority = match cli.authority {
        Some(authority) => authority,
        None => config.client()?.authority_address.clone(),
    };

    init_tracing("switchboard_client", config.log_level());

    let addr = match request_assignment(&authority)
        .await
        .with_context(|| format!("assignment request to {} failed", authority))?
    {
        Assignment::Connect(addr) => addr,
        Assignment::NoServersAvailable => {
            println!("No free servers right now. Try later.");
            return Ok(());
        }
    };

    info!("Assigned worker at {}", addr);
    let mut session = ChatSession::connect(addr).await?;
    println!("Connected to server at {}. Type messages to chat.", session.peer());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line == "quit" || line == "exit" {
            break;
        }
        if line.is_empty() {
            continue;
        }

        match session.exchange(line.as_bytes()).await {
            Ok(reply) => println!("Server: {}", String::from_utf8_lossy(&reply)),
            Err(e) => {
                println!("Server disconnected: {}", e);
                return Ok(());
            }
        }
    }

    session.close().await?;
    println!("Chat ended.");
    Ok(())
}
