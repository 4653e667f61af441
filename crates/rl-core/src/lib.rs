//! rl-core: Core abstractions and configuration for roomlink
//!
//! This crate provides the identity store and its backends, the seams the
//! session controllers talk through (event bridge, nickname side channel),
//! the error taxonomy, and client configuration.

pub mod config;
pub mod error;
pub mod store;
pub mod traits;

pub use error::{BridgeError, ConfigError, NicknameUpdateError, RlError, StoreError};
pub use store::{FileBackend, IdentityStore, MemoryBackend};
pub use traits::{EventBridge, KeyValueBackend, NicknameEndpoint};
