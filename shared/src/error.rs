//! Errors raised while encoding, decoding or validating protocol messages

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode packet: {0}")]
    Encode(bincode::Error),

    #[error("failed to decode packet: {0}")]
    Decode(bincode::Error),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl ProtocolError {
    /// Errors after which the byte stream can no longer be trusted.
    ///
    /// A bad payload inside an intact frame only costs that one message.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_) | ProtocolError::FrameTooLarge { .. } | ProtocolError::Encode(_)
        )
    }
}
