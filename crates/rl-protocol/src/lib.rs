//! rl-protocol: Named-event wire contract for roomlink
//!
//! This crate defines the events exchanged between a chat-room client and
//! the server over the event bridge, the identifiers they carry, and the
//! line-delimited JSON codec used when the bridge runs over a byte stream.

pub mod codec;
pub mod error;
pub mod event;
pub mod session;

pub use codec::{EventCodec, MAX_FRAME_SIZE};
pub use error::ProtocolError;
pub use event::{
    ClearParticipant, ClientEvent, ClientEventKind, NamedEvent, NicknamePayload, NoPayload,
    ParticipantBinding, ServerEvent, ServerEventKind, SessionAnnouncement, SessionNicknameUpdate,
};
pub use session::{ParticipantId, RoomId, SessionId};
