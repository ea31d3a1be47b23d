use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "A bidirectional-streaming chat client and server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat server
    ///
    /// Binds the listening endpoint and services one client session at a
    /// time. The port comes from --port or the PARLEY_PORT environment
    /// variable.
    ///
    /// Example: parley serve --port 50051
    Serve {
        /// Port to listen on. Falls back to PARLEY_PORT
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Connect to a chat server and start exchanging messages
    ///
    /// The target comes from ADDRESS or the PARLEY_SERVER_ADDR environment
    /// variable. Connection establishment retries with jittered exponential
    /// backoff before giving up.
    ///
    /// Examples:
    ///   parley connect 127.0.0.1:50051
    ///   PARLEY_SERVER_ADDR=127.0.0.1:50051 parley connect
    Connect {
        /// Address of the chat server (host:port). Falls back to
        /// PARLEY_SERVER_ADDR
        address: Option<String>,
    },
}
