//! Nickname side-channel trait

use async_trait::async_trait;

use crate::error::NicknameUpdateError;
use rl_protocol::SessionNicknameUpdate;

/// Request/response channel for nickname writes, outside the event bridge
///
/// Implementations must only return `Ok` once the server has accepted the
/// nickname for the session.
#[async_trait]
pub trait NicknameEndpoint: Send + Sync {
    /// Set the nickname for a session on the server
    async fn set_nickname(&self, update: &SessionNicknameUpdate)
        -> Result<(), NicknameUpdateError>;
}
