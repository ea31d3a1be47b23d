pub mod types;
pub mod wire;

pub use types::ChatMessage;
pub use wire::{
    FramedMessage,
    WireConfig,
    WireProtocolError,

    // Wire protocol constants
    LENGTH_PREFIX_SIZE,
    MAX_MESSAGE_SIZE,
    DEFAULT_READ_TIMEOUT,
    DEFAULT_WRITE_TIMEOUT,
};
