use crate::network::session::{shutdown_signal, ChatSession, SessionConfig};
use crate::network::Connection;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Sender identity stamped on every envelope the server emits
pub const SERVER_IDENTITY: &str = "Server";

/// Server-side service host.
///
/// Binds a listening endpoint and services stream-establishing requests one
/// at a time: each accepted connection gets a full [`ChatSession`], and the
/// next accept happens only after both directions of that session have
/// ended.
pub struct Server {
    listener: TcpListener,
    session_config: SessionConfig,
}

impl Server {
    /// Bind the listening endpoint. Failure here is fatal; the process
    /// cannot start without it.
    pub async fn bind(addr: &str) -> Result<Self> {
        Self::bind_with_config(addr, SessionConfig::new(SERVER_IDENTITY)).await
    }

    /// Bind with a custom session configuration (identity, send pacing)
    pub async fn bind_with_config(addr: &str, session_config: SessionConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind chat server to {}", addr))?;

        info!("Chat server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            session_config,
        })
    }

    /// The bound address, useful when binding to port 0
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and service connections until shutdown is requested.
    ///
    /// Accept errors are logged and do not stop the loop; only bind-time
    /// failure is fatal.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Chat server started. Waiting for clients...");

        loop {
            let accepted = tokio::select! {
                _ = shutdown_signal(&mut shutdown) => {
                    info!("Server stopping: shutdown requested");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            let stream = match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let connection = Connection::new(stream);
            // Peer metadata is informational only; an unavailable address
            // must never block session start.
            match connection.peer_addr() {
                Ok(peer) => info!("New client connected from: {}", peer),
                Err(_) => info!("New client connected, but peer address is unavailable."),
            }

            let session = ChatSession::new(self.session_config.clone());
            let summary = session.run(connection, shutdown.clone()).await;
            info!(
                "Client session ended (receive: {:?}, send: {:?})",
                summary.receive, summary.send
            );
        }
    }
}
