//! Event bridge trait

use crate::error::BridgeError;
use rl_protocol::ClientEvent;

/// Client half of the bidirectional named-event channel
///
/// Pushes are fire-and-forget: `Ok` means the event was handed to the
/// channel, not that the server received it. Any acknowledgement arrives
/// later as a separate server event. Server events are delivered to the
/// owner of the bridge in send order and are never replayed.
///
/// A bridge is only valid for one activation; controllers must not hold on
/// to it across deactivation.
pub trait EventBridge: Send + Sync {
    /// Send an event to the server
    fn push(&self, event: ClientEvent) -> Result<(), BridgeError>;

    /// Whether the channel currently accepts pushes
    fn is_connected(&self) -> bool;
}
