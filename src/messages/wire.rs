use crate::messages::ChatMessage;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

// Wire protocol constants
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64KB is generous for chat lines
pub const LENGTH_PREFIX_SIZE: usize = 4; // 4 bytes for u32 length prefix
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for wire protocol operations including timeouts and message size limits
#[derive(Debug, Clone)]
pub struct WireConfig {
    pub max_message_size: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl WireConfig {
    /// Create a new WireConfig with custom parameters
    pub fn new(max_message_size: usize, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            max_message_size,
            read_timeout,
            write_timeout,
        }
    }

    /// Create a WireConfig with a single timeout for both read and write operations
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
            read_timeout: timeout,
            write_timeout: timeout,
        }
    }
}

/// Custom error types for wire protocol operations
#[derive(Error, Debug)]
pub enum WireProtocolError {
    #[error("Message too large: {size} bytes exceeds maximum of {max_size} bytes")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Invalid length prefix: {length}")]
    InvalidLength { length: u32 },

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Unexpected end of stream while reading {operation}")]
    UnexpectedEof { operation: &'static str },

    #[error("Read operation timed out after {timeout:?}")]
    ReadTimeout { timeout: Duration },

    #[error("Write operation timed out after {timeout:?}")]
    WriteTimeout { timeout: Duration },

    #[error("Corrupted data: {reason}")]
    CorruptedData { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WireProtocolError {
    /// True when the peer shut its write side down cleanly between frames
    pub fn is_clean_close(&self) -> bool {
        matches!(self, WireProtocolError::ConnectionClosed)
    }
}

/// Length-prefixed framing for [`ChatMessage`] envelopes.
///
/// Each frame is a 4-byte big-endian length prefix followed by the
/// bincode-encoded envelope. The codec validates lengths before allocating
/// and distinguishes a clean close (EOF on a frame boundary) from a stream
/// cut mid-frame.
#[derive(Debug, Clone)]
pub struct FramedMessage {
    config: WireConfig,
}

impl Default for FramedMessage {
    fn default() -> Self {
        Self {
            config: WireConfig::default(),
        }
    }
}

impl FramedMessage {
    /// Create a new FramedMessage with custom wire protocol configuration
    pub fn new(config: WireConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WireConfig {
        &self.config
    }

    pub fn read_timeout(&self) -> Duration {
        self.config.read_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.config.write_timeout
    }

    /// Validate a length prefix before allocating a receive buffer
    fn validate_length(&self, length: u32) -> Result<usize, WireProtocolError> {
        if length == 0 {
            warn!("Received zero-length message prefix");
            return Err(WireProtocolError::InvalidLength { length });
        }

        let length = length as usize;
        if length > self.config.max_message_size {
            warn!(
                size = length,
                max_size = self.config.max_message_size,
                "Length prefix exceeds maximum message size"
            );
            return Err(WireProtocolError::MessageTooLarge {
                size: length,
                max_size: self.config.max_message_size,
            });
        }

        Ok(length)
    }

    /// Serialize and write one envelope as a length-prefixed frame
    pub async fn write_message(
        &self,
        writer: &mut (impl AsyncWrite + Unpin),
        envelope: &ChatMessage,
    ) -> Result<(), WireProtocolError> {
        let body = bincode::serialize(envelope)?;

        if body.len() > self.config.max_message_size {
            return Err(WireProtocolError::MessageTooLarge {
                size: body.len(),
                max_size: self.config.max_message_size,
            });
        }

        let length_prefix = (body.len() as u32).to_be_bytes();
        writer.write_all(&length_prefix).await?;
        writer.write_all(&body).await?;
        writer.flush().await?;

        trace!(bytes = body.len(), "Wrote framed message");
        Ok(())
    }

    /// Read one length-prefixed frame and deserialize the envelope.
    ///
    /// Returns [`WireProtocolError::ConnectionClosed`] when the stream ends
    /// exactly on a frame boundary, and [`WireProtocolError::UnexpectedEof`]
    /// when it ends mid-frame.
    pub async fn read_message(
        &self,
        reader: &mut (impl AsyncRead + Unpin),
    ) -> Result<ChatMessage, WireProtocolError> {
        let mut length_buffer = [0u8; LENGTH_PREFIX_SIZE];
        let mut total_read = 0;

        while total_read < LENGTH_PREFIX_SIZE {
            match reader.read(&mut length_buffer[total_read..]).await? {
                // EOF before any prefix byte means the peer closed cleanly
                // between frames; EOF inside the prefix means the frame was
                // cut short.
                0 if total_read == 0 => return Err(WireProtocolError::ConnectionClosed),
                0 => {
                    return Err(WireProtocolError::UnexpectedEof {
                        operation: "length prefix",
                    })
                }
                n => total_read += n,
            }
        }

        let message_length = u32::from_be_bytes(length_buffer);
        let validated_length = self.validate_length(message_length)?;

        let mut body = vec![0u8; validated_length];
        let mut total_read = 0;
        while total_read < validated_length {
            match reader.read(&mut body[total_read..]).await? {
                0 => {
                    return Err(WireProtocolError::UnexpectedEof {
                        operation: "message body",
                    })
                }
                n => total_read += n,
            }
        }

        let envelope =
            bincode::deserialize(&body).map_err(|e| WireProtocolError::CorruptedData {
                reason: format!("Failed to deserialize chat message: {}", e),
            })?;

        trace!(bytes = validated_length, "Read framed message");
        Ok(envelope)
    }

    /// Read a message, failing with [`WireProtocolError::ReadTimeout`] if the
    /// configured read timeout elapses first
    pub async fn read_message_with_timeout(
        &self,
        reader: &mut (impl AsyncRead + Unpin),
    ) -> Result<ChatMessage, WireProtocolError> {
        let timeout = self.config.read_timeout;
        match tokio::time::timeout(timeout, self.read_message(reader)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(?timeout, "Read operation timed out");
                Err(WireProtocolError::ReadTimeout { timeout })
            }
        }
    }

    /// Write a message, failing with [`WireProtocolError::WriteTimeout`] if
    /// the configured write timeout elapses first
    pub async fn write_message_with_timeout(
        &self,
        writer: &mut (impl AsyncWrite + Unpin),
        envelope: &ChatMessage,
    ) -> Result<(), WireProtocolError> {
        let timeout = self.config.write_timeout;
        match tokio::time::timeout(timeout, self.write_message(writer, envelope)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(?timeout, "Write operation timed out");
                Err(WireProtocolError::WriteTimeout { timeout })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_length_rejects_zero() {
        let framed = FramedMessage::default();
        assert!(matches!(
            framed.validate_length(0),
            Err(WireProtocolError::InvalidLength { length: 0 })
        ));
    }

    #[test]
    fn test_validate_length_rejects_oversized() {
        let framed = FramedMessage::new(WireConfig {
            max_message_size: 16,
            ..WireConfig::default()
        });
        assert!(matches!(
            framed.validate_length(17),
            Err(WireProtocolError::MessageTooLarge { size: 17, max_size: 16 })
        ));
    }

    #[test]
    fn test_validate_length_accepts_in_range() {
        let framed = FramedMessage::default();
        assert_eq!(framed.validate_length(512).unwrap(), 512);
    }
}
