pub mod cli;
pub mod messages;
pub mod network;

// Re-export key types for easy testing
pub use messages::{ChatMessage, FramedMessage, WireConfig, WireProtocolError};
pub use network::{ChatSession, Connection, Connector, Server};
