//! In-process event bridge

use std::sync::Arc;

use tokio::sync::mpsc;

use rl_core::{BridgeError, EventBridge};
use rl_protocol::{ClientEvent, ServerEvent};

use super::BridgeConnection;

/// Bridge that hands pushed events to an mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelBridge {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelBridge {
    /// Wrap an existing sender
    pub fn new(tx: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self { tx }
    }

    /// Create a connected client/server pair in memory
    pub fn pair() -> (BridgeConnection, ServerEnds) {
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let connection = BridgeConnection {
            bridge: Arc::new(Self::new(push_tx)),
            events: event_rx,
        };
        let server = ServerEnds {
            pushed: push_rx,
            events: event_tx,
        };
        (connection, server)
    }
}

impl EventBridge for ChannelBridge {
    fn push(&self, event: ClientEvent) -> Result<(), BridgeError> {
        tracing::trace!("Pushing {}", event.kind().as_str());
        self.tx
            .send(event)
            .map_err(|_| BridgeError::ChannelUnavailable)
    }

    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Server side of an in-process bridge
pub struct ServerEnds {
    /// Events pushed by the client
    pub pushed: mpsc::UnboundedReceiver<ClientEvent>,
    /// Send events to the client
    pub events: mpsc::UnboundedSender<ServerEvent>,
}

impl ServerEnds {
    /// Send an event to the client; returns false once the client is gone
    pub fn send(&self, event: ServerEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Drain every event pushed so far
    pub fn drain(&mut self) -> Vec<ClientEvent> {
        std::iter::from_fn(|| self.pushed.try_recv().ok()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rl_protocol::SessionId;

    #[test]
    fn test_pair_delivers_both_ways() {
        let (mut connection, mut server) = ChannelBridge::pair();

        connection.bridge.push(ClientEvent::leave()).unwrap();
        assert_eq!(server.drain(), vec![ClientEvent::leave()]);

        assert!(server.send(ServerEvent::ClearNickname(Default::default())));
        assert!(matches!(
            connection.events.try_recv(),
            Ok(ServerEvent::ClearNickname(_))
        ));
    }

    #[test]
    fn test_push_after_server_gone_is_unavailable() {
        let (connection, server) = ChannelBridge::pair();
        drop(server);

        assert!(!connection.bridge.is_connected());
        let result = connection
            .bridge
            .push(ClientEvent::announce(SessionId::new("s")));
        assert!(matches!(result, Err(BridgeError::ChannelUnavailable)));
    }
}
