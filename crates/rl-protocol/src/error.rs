//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding bridge events
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Event name not part of the contract
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Frame exceeds maximum size
    #[error("Frame too large: {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },

    /// Frame was not valid UTF-8
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
