use serde::{Deserialize, Serialize};

/// The envelope exchanged over a chat stream.
///
/// Both fields are always populated: an envelope is constructed immediately
/// before each send and never transmitted half-built. Received envelopes are
/// logged and dropped; no history is kept on either side.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Identity of the originating party ("Client" or "Server" in this
    /// system, but logically arbitrary).
    pub sender: String,
    /// Free-form text payload.
    pub message: String,
}

impl ChatMessage {
    /// Create a new envelope with the given sender identity and payload
    pub fn new(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            message: message.into(),
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
