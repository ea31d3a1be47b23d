pub mod client;
pub mod connection;
pub mod server;
pub mod session;

pub use client::{backoff_with_jitter, ConnectError, ConnectionState, Connector, RetryConfig};
pub use connection::{Connection, ConnectionError, ConnectionReader, ConnectionWriter};
pub use server::{Server, SERVER_IDENTITY};
pub use session::{ChatSession, LoopOutcome, SessionConfig, SessionSummary};
