use anyhow::{Context, Result};
use clap::Parser;
use parley::cli::{Cli, Commands};
use parley::network::{ChatSession, Connector, Server, SessionConfig};
use tokio::sync::watch;
use tracing::{error, info};

/// Sender identity stamped on every envelope the client emits
const CLIENT_IDENTITY: &str = "Client";

const SERVER_ADDR_ENV: &str = "PARLEY_SERVER_ADDR";
const PORT_ENV: &str = "PARLEY_PORT";

/// Turn ctrl-c into a shutdown signal observable by every session loop
fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested, stopping...");
            let _ = tx.send(true);
        }
    });
    rx
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let port: u16 = match port {
                Some(port) => port,
                None => std::env::var(PORT_ENV)
                    .with_context(|| format!("no --port given and {} is not set", PORT_ENV))?
                    .parse()
                    .with_context(|| format!("{} is not a valid port number", PORT_ENV))?,
            };

            info!("Starting chat server on port {}...", port);
            let server = Server::bind(&format!("0.0.0.0:{}", port)).await?;
            server.run(shutdown_on_ctrl_c()).await?;
        }
        Commands::Connect { address } => {
            let address = match address {
                Some(address) => address,
                None => std::env::var(SERVER_ADDR_ENV).with_context(|| {
                    format!("no address given and {} is not set", SERVER_ADDR_ENV)
                })?,
            };

            let mut connector = Connector::new();
            let connection = match connector.connect(&address).await {
                Ok(connection) => connection,
                Err(e) => {
                    // Retry budget spent: nothing above us can recover.
                    error!("{}. Exiting.", e);
                    std::process::exit(1);
                }
            };

            let session = ChatSession::new(SessionConfig::new(CLIENT_IDENTITY));
            let summary = session.run(connection, shutdown_on_ctrl_c()).await;
            info!(
                "Chat session ended (receive: {:?}, send: {:?})",
                summary.receive, summary.send
            );
        }
    }

    Ok(())
}
