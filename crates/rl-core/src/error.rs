//! Core error types for roomlink

use rl_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for roomlink
#[derive(Error, Debug)]
pub enum RlError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Storage error
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Event bridge error
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Nickname side-channel error
    #[error("Nickname update failed: {0}")]
    Nickname(#[from] NicknameUpdateError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Identity store errors
///
/// Callers never fail hard on these: they degrade to in-memory state for
/// the rest of the activation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Durable storage cannot be read or written
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Event bridge errors
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The channel is not connected; the push was not sent
    #[error("Channel unavailable")]
    ChannelUnavailable,

    /// The channel could not be established
    #[error("Failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },
}

/// Nickname side-channel errors
///
/// The local nickname mirror is never written when one of these is returned.
#[derive(Error, Debug)]
pub enum NicknameUpdateError {
    /// The request could not be delivered
    #[error("Request failed: {0}")]
    Request(String),

    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// The server answered with a non-success status
    #[error("Server rejected update with status {0}")]
    Status(u16),

    /// No nickname controller is active to perform the update
    #[error("Nickname session is not active")]
    Inactive,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
