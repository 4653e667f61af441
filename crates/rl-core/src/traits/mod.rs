//! Core trait definitions

mod bridge;
mod endpoint;
mod store;

pub use bridge::EventBridge;
pub use endpoint::NicknameEndpoint;
pub use store::KeyValueBackend;
