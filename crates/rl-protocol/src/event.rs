//! Named events exchanged over the event bridge
//!
//! Every event travels as a JSON object with the event name under `event`
//! and its payload under `payload`:
//!
//! ```json
//! {"event": "save_participant", "payload": {"room_id": "r1", "participant_id": "p1"}}
//! ```
//!
//! # Event Flow
//!
//! 1. Room activation with a stored binding: client sends `restore_participant`
//! 2. Server settles the binding with `save_participant` or `clear_participant`
//! 3. Nickname activation: client sends `set_session_id` (every activation)
//! 4. Server mirrors nickname changes with `save_nickname` / `clear_nickname`
//! 5. Server asks for a side-channel nickname write with `update_session_nickname`
//! 6. Any termination signal: client sends `leave_room` once

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::session::{ParticipantId, RoomId, SessionId};

/// Payload for events with no fields; serializes as `{}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoPayload {}

/// A room's participant binding (`restore_participant`, `save_participant`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantBinding {
    /// Room the binding belongs to
    pub room_id: RoomId,
    /// Server-issued participant ID
    pub participant_id: ParticipantId,
}

impl ParticipantBinding {
    /// Create a new binding
    pub fn new(room_id: impl Into<RoomId>, participant_id: impl Into<ParticipantId>) -> Self {
        Self {
            room_id: room_id.into(),
            participant_id: participant_id.into(),
        }
    }
}

/// Payload for `clear_participant`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearParticipant {
    /// Room whose binding should be dropped
    pub room_id: RoomId,
}

/// Payload for `set_session_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAnnouncement {
    /// Durable session identifier
    pub session_id: SessionId,
}

/// Payload for `save_nickname`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicknamePayload {
    /// Nickname accepted by the server
    pub nickname: String,
}

/// Payload for `update_session_nickname`, also the side-channel request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionNicknameUpdate {
    /// Candidate nickname
    pub nickname: String,
    /// Session the nickname belongs to
    pub session_id: SessionId,
}

/// Events pushed from the client to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Ask the server to re-attach a remembered participant to its room
    RestoreParticipant(ParticipantBinding),
    /// The participant is leaving the room for good
    LeaveRoom(NoPayload),
    /// Register or re-announce the durable session
    SetSessionId(SessionAnnouncement),
}

/// Client event name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEventKind {
    RestoreParticipant,
    LeaveRoom,
    SetSessionId,
}

impl ClientEventKind {
    /// Every client event kind
    pub const ALL: [ClientEventKind; 3] = [
        ClientEventKind::RestoreParticipant,
        ClientEventKind::LeaveRoom,
        ClientEventKind::SetSessionId,
    ];

    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientEventKind::RestoreParticipant => "restore_participant",
            ClientEventKind::LeaveRoom => "leave_room",
            ClientEventKind::SetSessionId => "set_session_id",
        }
    }

    /// Look up a kind by wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl ClientEvent {
    /// Build a `restore_participant` event
    pub fn restore(room_id: RoomId, participant_id: ParticipantId) -> Self {
        ClientEvent::RestoreParticipant(ParticipantBinding {
            room_id,
            participant_id,
        })
    }

    /// Build a `leave_room` event
    pub fn leave() -> Self {
        ClientEvent::LeaveRoom(NoPayload {})
    }

    /// Build a `set_session_id` event
    pub fn announce(session_id: SessionId) -> Self {
        ClientEvent::SetSessionId(SessionAnnouncement { session_id })
    }

    /// Get the kind of this event
    pub fn kind(&self) -> ClientEventKind {
        match self {
            ClientEvent::RestoreParticipant(_) => ClientEventKind::RestoreParticipant,
            ClientEvent::LeaveRoom(_) => ClientEventKind::LeaveRoom,
            ClientEvent::SetSessionId(_) => ClientEventKind::SetSessionId,
        }
    }
}

/// Events sent from the server to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Store (or overwrite) the binding for a room
    SaveParticipant(ParticipantBinding),
    /// Forget the binding for a room
    ClearParticipant(ClearParticipant),
    /// Mirror the accepted nickname locally
    SaveNickname(NicknamePayload),
    /// Forget the local nickname
    ClearNickname(NoPayload),
    /// Write the nickname through the side channel, then mirror it
    UpdateSessionNickname(SessionNicknameUpdate),
}

/// Server event name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerEventKind {
    SaveParticipant,
    ClearParticipant,
    SaveNickname,
    ClearNickname,
    UpdateSessionNickname,
}

impl ServerEventKind {
    /// Every server event kind
    pub const ALL: [ServerEventKind; 5] = [
        ServerEventKind::SaveParticipant,
        ServerEventKind::ClearParticipant,
        ServerEventKind::SaveNickname,
        ServerEventKind::ClearNickname,
        ServerEventKind::UpdateSessionNickname,
    ];

    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerEventKind::SaveParticipant => "save_participant",
            ServerEventKind::ClearParticipant => "clear_participant",
            ServerEventKind::SaveNickname => "save_nickname",
            ServerEventKind::ClearNickname => "clear_nickname",
            ServerEventKind::UpdateSessionNickname => "update_session_nickname",
        }
    }

    /// Look up a kind by wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl ServerEvent {
    /// Get the kind of this event
    pub fn kind(&self) -> ServerEventKind {
        match self {
            ServerEvent::SaveParticipant(_) => ServerEventKind::SaveParticipant,
            ServerEvent::ClearParticipant(_) => ServerEventKind::ClearParticipant,
            ServerEvent::SaveNickname(_) => ServerEventKind::SaveNickname,
            ServerEvent::ClearNickname(_) => ServerEventKind::ClearNickname,
            ServerEvent::UpdateSessionNickname(_) => ServerEventKind::UpdateSessionNickname,
        }
    }
}

/// An event type that travels as `{"event": .., "payload": ..}`
pub trait NamedEvent: Serialize + DeserializeOwned {
    /// Wire name of this event
    fn name(&self) -> &'static str;

    /// Whether `name` is a known event of this direction
    fn is_known_name(name: &str) -> bool;

    /// Encode as a single-line JSON document
    fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON, reporting unknown names as [`ProtocolError::UnknownEvent`]
    fn from_json(text: &str) -> Result<Self, ProtocolError> {
        #[derive(Deserialize)]
        struct EventName {
            event: String,
        }

        let EventName { event } = serde_json::from_str(text)?;
        if !Self::is_known_name(&event) {
            return Err(ProtocolError::UnknownEvent(event));
        }
        Ok(serde_json::from_str(text)?)
    }
}

impl NamedEvent for ClientEvent {
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn is_known_name(name: &str) -> bool {
        ClientEventKind::from_name(name).is_some()
    }
}

impl NamedEvent for ServerEvent {
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn is_known_name(name: &str) -> bool {
        ServerEventKind::from_name(name).is_some()
    }
}
