//! Tokio codec for line-delimited bridge events
//!
//! Each frame is one JSON event followed by `\n`. Frames that name an
//! unknown event or carry a malformed payload are logged and skipped so a
//! single bad event cannot tear down the channel; oversized frames are
//! fatal.

use std::marker::PhantomData;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::event::NamedEvent;

/// Maximum frame size in bytes, excluding the newline
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Codec that decodes events of type `D` and encodes any [`NamedEvent`]
///
/// A client uses `EventCodec<ServerEvent>`; a server (or a test standing in
/// for one) uses `EventCodec<ClientEvent>`.
#[derive(Debug)]
pub struct EventCodec<D> {
    /// Offset already scanned for a newline
    next_index: usize,
    _decodes: PhantomData<fn() -> D>,
}

impl<D> EventCodec<D> {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            next_index: 0,
            _decodes: PhantomData,
        }
    }
}

impl<D> Default for EventCodec<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: NamedEvent> EventCodec<D> {
    /// Parse one line, returning `None` when it should be skipped
    fn parse_line(line: &[u8]) -> Option<D> {
        let text = match std::str::from_utf8(line) {
            Ok(text) => text.trim(),
            Err(_) => {
                tracing::warn!("Skipping frame: {}", ProtocolError::InvalidUtf8);
                return None;
            }
        };

        if text.is_empty() {
            return None;
        }

        match D::from_json(text) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!("Skipping frame: {}", e);
                None
            }
        }
    }
}

impl<D: NamedEvent> Decoder for EventCodec<D> {
    type Item = D;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');

            let Some(offset) = newline else {
                if src.len() > MAX_FRAME_SIZE {
                    return Err(ProtocolError::FrameTooLarge {
                        size: src.len(),
                        max: MAX_FRAME_SIZE,
                    });
                }
                // Need more data
                self.next_index = src.len();
                return Ok(None);
            };

            let line_len = self.next_index + offset;
            self.next_index = 0;

            if line_len > MAX_FRAME_SIZE {
                return Err(ProtocolError::FrameTooLarge {
                    size: line_len,
                    max: MAX_FRAME_SIZE,
                });
            }

            let frame = src.split_to(line_len + 1);
            if let Some(event) = Self::parse_line(&frame[..line_len]) {
                return Ok(Some(event));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }

        // Trailing frame without a newline
        self.next_index = 0;
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split_to(src.len());
        Ok(Self::parse_line(&rest))
    }
}

impl<D, E: NamedEvent> Encoder<E> for EventCodec<D> {
    type Error = ProtocolError;

    fn encode(&mut self, event: E, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = event.to_json()?;

        if line.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: line.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ClientEvent, ParticipantBinding, ServerEvent};
    use crate::session::SessionId;

    #[test]
    fn test_encode_appends_newline() {
        let mut codec = EventCodec::<ServerEvent>::new();
        let mut buf = BytesMut::new();
        codec.encode(ClientEvent::leave(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"{\"event\":\"leave_room\",\"payload\":{}}\n");
    }

    #[test]
    fn test_client_and_server_codecs_interoperate() {
        let mut client = EventCodec::<ServerEvent>::new();
        let mut server = EventCodec::<ClientEvent>::new();

        let mut wire = BytesMut::new();
        client
            .encode(ClientEvent::announce(SessionId::new("s-1")), &mut wire)
            .unwrap();
        let received = server.decode(&mut wire).unwrap().unwrap();
        assert_eq!(received, ClientEvent::announce(SessionId::new("s-1")));
        assert!(wire.is_empty());
    }

    #[test]
    fn test_partial_read() {
        let mut codec = EventCodec::<ServerEvent>::new();
        let line = b"{\"event\":\"save_participant\",\"payload\":{\"room_id\":\"r1\",\"participant_id\":\"p1\"}}\n";

        let mut buf = BytesMut::from(&line[..20]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&line[20..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            decoded,
            ServerEvent::SaveParticipant(ParticipantBinding::new("r1", "p1"))
        );
    }

    #[test]
    fn test_unknown_and_blank_lines_are_skipped() {
        let mut codec = EventCodec::<ServerEvent>::new();
        let mut buf = BytesMut::from(
            &b"\n{\"event\":\"presence_diff\",\"payload\":{}}\nnot json\n{\"event\":\"clear_nickname\",\"payload\":{}}\n"[..],
        );

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(decoded, ServerEvent::ClearNickname(_)));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_eof_without_trailing_newline() {
        let mut codec = EventCodec::<ServerEvent>::new();
        let mut buf = BytesMut::from(&b"{\"event\":\"clear_nickname\",\"payload\":{}}"[..]);
        let decoded = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert!(matches!(decoded, ServerEvent::ClearNickname(_)));
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let mut codec = EventCodec::<ServerEvent>::new();
        let mut buf = BytesMut::from(vec![b'x'; MAX_FRAME_SIZE + 1].as_slice());
        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }
}
