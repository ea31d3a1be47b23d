use crate::messages::{ChatMessage, FramedMessage, WireConfig, WireProtocolError};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::trace;

/// Errors surfaced to the session layer by an established connection
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Connection closed by peer")]
    Closed,

    #[error("Wire protocol error: {0}")]
    WireProtocol(WireProtocolError),
}

impl From<WireProtocolError> for ConnectionError {
    fn from(err: WireProtocolError) -> Self {
        if err.is_clean_close() {
            ConnectionError::Closed
        } else {
            ConnectionError::WireProtocol(err)
        }
    }
}

/// An established duplex stream carrying [`ChatMessage`] envelopes.
///
/// The connection itself holds no chat state; it pairs a `TcpStream` with the
/// framed codec. [`Connection::into_split`] hands the read half and write
/// half to their exclusive owners so the two session loops can run without
/// any shared locking.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    framed: FramedMessage,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self::with_config(stream, WireConfig::default())
    }

    pub fn with_config(stream: TcpStream, config: WireConfig) -> Self {
        Self {
            stream,
            framed: FramedMessage::new(config),
        }
    }

    /// Peer address metadata, when the transport can provide it
    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Send one envelope on the stream
    pub async fn send(&mut self, envelope: &ChatMessage) -> Result<(), ConnectionError> {
        self.framed.write_message(&mut self.stream, envelope).await?;
        Ok(())
    }

    /// Receive the next envelope from the stream
    pub async fn receive(&mut self) -> Result<ChatMessage, ConnectionError> {
        let envelope = self.framed.read_message(&mut self.stream).await?;
        Ok(envelope)
    }

    /// Split into independently owned halves, one per direction.
    ///
    /// The read half belongs to the receive loop and the write half to the
    /// send loop; closing is observed separately by each.
    pub fn into_split(self) -> (ConnectionReader, ConnectionWriter) {
        let (read_half, write_half) = self.stream.into_split();
        let reader = ConnectionReader {
            half: read_half,
            framed: self.framed.clone(),
        };
        let writer = ConnectionWriter {
            half: write_half,
            framed: self.framed,
        };
        (reader, writer)
    }
}

/// Exclusive owner of a connection's inbound direction
pub struct ConnectionReader {
    half: OwnedReadHalf,
    framed: FramedMessage,
}

impl ConnectionReader {
    /// Block until the next inbound envelope, clean closure, or read error
    pub async fn receive(&mut self) -> Result<ChatMessage, ConnectionError> {
        let envelope = self.framed.read_message(&mut self.half).await?;
        trace!(sender = %envelope.sender(), "Received envelope");
        Ok(envelope)
    }
}

/// Exclusive owner of a connection's outbound direction
pub struct ConnectionWriter {
    half: OwnedWriteHalf,
    framed: FramedMessage,
}

impl ConnectionWriter {
    /// Write one envelope to the stream
    pub async fn send(&mut self, envelope: &ChatMessage) -> Result<(), ConnectionError> {
        self.framed.write_message(&mut self.half, envelope).await?;
        trace!(sender = %envelope.sender(), "Sent envelope");
        Ok(())
    }
}
