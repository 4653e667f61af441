//! Typed identity store

use std::sync::Arc;

use rl_protocol::{ParticipantId, RoomId, SessionId};

use crate::error::StoreError;
use crate::traits::KeyValueBackend;

use super::MemoryBackend;

/// Key prefix for per-room participant bindings
const PARTICIPANT_KEY_PREFIX: &str = "participant_";

/// Key for the durable session identifier
const SESSION_ID_KEY: &str = "chat_session_id";

/// Key for the last nickname accepted by the server
const NICKNAME_KEY: &str = "chat_nickname";

/// Durable client-side identity: per-room participant bindings, the session
/// identifier and the last accepted nickname
///
/// Holds no state of its own; every call goes to the backend. At most one
/// binding exists per room: `set_participant` overwrites and
/// `clear_participant` removes. Set-once semantics for the session id are
/// the caller's job.
///
/// Every clone also shares one in-memory [`fallback`](Self::fallback) store
/// that lives as long as the clones do.
#[derive(Clone)]
pub struct IdentityStore {
    backend: Arc<dyn KeyValueBackend>,
    fallback: Arc<MemoryBackend>,
}

impl IdentityStore {
    /// Create a store over a backend
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            backend,
            fallback: Arc::new(MemoryBackend::new()),
        }
    }

    /// In-memory store to use while the backend is unavailable
    ///
    /// Shared by all clones of this store, so state written there survives
    /// from one activation to the next for the life of the process.
    pub fn fallback(&self) -> IdentityStore {
        IdentityStore {
            backend: self.fallback.clone(),
            fallback: Arc::clone(&self.fallback),
        }
    }

    /// Create a store over a fresh in-memory backend
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    fn participant_key(room_id: &RoomId) -> String {
        format!("{}{}", PARTICIPANT_KEY_PREFIX, room_id.as_str())
    }

    /// Participant remembered for a room, if any
    pub fn get_participant(&self, room_id: &RoomId) -> Result<Option<ParticipantId>, StoreError> {
        Ok(self
            .backend
            .get(&Self::participant_key(room_id))?
            .map(ParticipantId::from))
    }

    /// Remember the participant for a room, replacing any previous binding
    pub fn set_participant(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
    ) -> Result<(), StoreError> {
        self.backend
            .set(&Self::participant_key(room_id), participant_id.as_str())
    }

    /// Forget the participant for a room; no-op when absent
    pub fn clear_participant(&self, room_id: &RoomId) -> Result<(), StoreError> {
        self.backend.remove(&Self::participant_key(room_id))
    }

    /// Stored session identifier, if one was ever generated
    pub fn get_session_id(&self) -> Result<Option<SessionId>, StoreError> {
        Ok(self.backend.get(SESSION_ID_KEY)?.map(SessionId::from))
    }

    /// Store the session identifier
    pub fn set_session_id(&self, session_id: &SessionId) -> Result<(), StoreError> {
        self.backend.set(SESSION_ID_KEY, session_id.as_str())
    }

    /// Last nickname accepted by the server
    pub fn get_nickname(&self) -> Result<Option<String>, StoreError> {
        self.backend.get(NICKNAME_KEY)
    }

    /// Mirror a nickname accepted by the server
    pub fn set_nickname(&self, nickname: &str) -> Result<(), StoreError> {
        self.backend.set(NICKNAME_KEY, nickname)
    }

    /// Forget the nickname
    pub fn clear_nickname(&self) -> Result<(), StoreError> {
        self.backend.remove(NICKNAME_KEY)
    }
}

impl std::fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityStore").finish_non_exhaustive()
    }
}
