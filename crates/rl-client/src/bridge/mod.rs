//! Event bridge implementations
//!
//! A bridge connection is the pair the runtime works with: a push handle
//! for client events and the ordered stream of server events.

mod channel;
mod tcp;

use std::sync::Arc;

use tokio::sync::mpsc;

use rl_core::{BridgeError, EventBridge};
use rl_protocol::{ClientEvent, ServerEvent};

pub use channel::{ChannelBridge, ServerEnds};
pub use tcp::TcpBridge;

/// One live channel to the server
pub struct BridgeConnection {
    /// Push handle shared by the controllers
    pub bridge: Arc<dyn EventBridge>,
    /// Server events in delivery order; ends when the channel closes
    pub events: mpsc::UnboundedReceiver<ServerEvent>,
}

/// Push an event, skipping the attempt when the channel is already down
pub(crate) fn push_if_connected(
    bridge: &dyn EventBridge,
    event: ClientEvent,
) -> Result<(), BridgeError> {
    if !bridge.is_connected() {
        tracing::debug!("Channel down, not pushing {}", event.kind().as_str());
        return Err(BridgeError::ChannelUnavailable);
    }
    bridge.push(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingBridge {
        down: AtomicBool,
        pushes: AtomicUsize,
    }

    impl EventBridge for CountingBridge {
        fn push(&self, _event: ClientEvent) -> Result<(), BridgeError> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            !self.down.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_push_goes_through_while_connected() {
        let bridge = CountingBridge::default();

        assert!(push_if_connected(&bridge, ClientEvent::leave()).is_ok());
        assert_eq!(bridge.pushes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_push_skipped_while_disconnected() {
        let bridge = CountingBridge::default();
        bridge.down.store(true, Ordering::SeqCst);

        let result = push_if_connected(&bridge, ClientEvent::leave());

        assert!(matches!(result, Err(BridgeError::ChannelUnavailable)));
        assert_eq!(bridge.pushes.load(Ordering::SeqCst), 0);
    }
}
