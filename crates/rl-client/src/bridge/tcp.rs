//! Event bridge over a TCP stream
//!
//! Events are framed with [`EventCodec`]. A writer task drains the push
//! queue onto the socket and a reader task forwards decoded server events;
//! when either side of the socket fails, both tasks stop, the event stream
//! ends and further pushes report the channel as unavailable.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use rl_core::BridgeError;
use rl_protocol::{ClientEvent, EventCodec, ServerEvent};

use super::{BridgeConnection, ChannelBridge};

/// Connector for the TCP event bridge
pub struct TcpBridge;

impl TcpBridge {
    /// Connect to the server and start the reader and writer tasks
    pub async fn connect(address: &str) -> Result<BridgeConnection, BridgeError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| BridgeError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {}", e);
        }

        tracing::info!("Event bridge connected to {}", address);

        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, EventCodec::<ServerEvent>::new());
        let mut writer = FramedWrite::new(write_half, EventCodec::<ServerEvent>::new());

        let (push_tx, mut push_rx) = mpsc::unbounded_channel::<ClientEvent>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ServerEvent>();
        let closed = CancellationToken::new();

        let writer_closed = closed.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_closed.cancelled() => break,
                    event = push_rx.recv() => {
                        let Some(event) = event else { break };
                        if let Err(e) = writer.send(event).await {
                            tracing::warn!("Event bridge write failed: {}", e);
                            break;
                        }
                    }
                }
            }
            // Close the queue so later pushes fail fast
            push_rx.close();
            writer_closed.cancel();
            tracing::debug!("Event bridge writer stopped");
        });

        let reader_closed = closed;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_closed.cancelled() => break,
                    frame = reader.next() => match frame {
                        Some(Ok(event)) => {
                            if event_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!("Event bridge read failed: {}", e);
                            break;
                        }
                        None => {
                            tracing::info!("Event bridge closed by server");
                            break;
                        }
                    }
                }
            }
            reader_closed.cancel();
        });

        Ok(BridgeConnection {
            bridge: Arc::new(ChannelBridge::new(push_tx)),
            events: event_rx,
        })
    }
}
