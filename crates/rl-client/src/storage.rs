//! Activation-scoped view of the identity store
//!
//! Storage failures never stop a controller. The first failure seen during
//! an activation is logged and switches that activation to the identity
//! store's in-memory fallback. The fallback outlives the activation, so a
//! session id created while degraded is reused by the next activation,
//! which still tries durable storage first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rl_core::{IdentityStore, StoreError};
use rl_protocol::{ParticipantId, RoomId, SessionId};

struct Inner {
    durable: IdentityStore,
    fallback: IdentityStore,
    degraded: AtomicBool,
}

/// Identity store wrapper that degrades to memory instead of failing
#[derive(Clone)]
pub struct ActivationStore {
    inner: Arc<Inner>,
}

impl ActivationStore {
    /// Start a new activation over the durable store
    pub fn new(durable: IdentityStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                fallback: durable.fallback(),
                durable,
                degraded: AtomicBool::new(false),
            }),
        }
    }

    /// Whether this activation has fallen back to memory
    pub fn is_degraded(&self) -> bool {
        self.inner.degraded.load(Ordering::Acquire)
    }

    fn with_store<T: Default>(
        &self,
        action: &str,
        op: impl Fn(&IdentityStore) -> Result<T, StoreError>,
    ) -> T {
        if !self.is_degraded() {
            match op(&self.inner.durable) {
                Ok(value) => return value,
                Err(e) => {
                    tracing::warn!(
                        "{} failed: {}. Using in-memory identity for this activation",
                        action,
                        e
                    );
                    self.inner.degraded.store(true, Ordering::Release);
                }
            }
        }

        op(&self.inner.fallback).unwrap_or_else(|e| {
            tracing::warn!("{} failed on fallback store: {}", action, e);
            T::default()
        })
    }

    /// Participant remembered for a room
    pub fn get_participant(&self, room_id: &RoomId) -> Option<ParticipantId> {
        self.with_store("Reading participant", |s| s.get_participant(room_id))
    }

    /// Remember the participant for a room
    pub fn set_participant(&self, room_id: &RoomId, participant_id: &ParticipantId) {
        self.with_store("Saving participant", |s| {
            s.set_participant(room_id, participant_id)
        })
    }

    /// Forget the participant for a room
    pub fn clear_participant(&self, room_id: &RoomId) {
        self.with_store("Clearing participant", |s| s.clear_participant(room_id))
    }

    /// Stored session id
    pub fn get_session_id(&self) -> Option<SessionId> {
        self.with_store("Reading session id", |s| s.get_session_id())
    }

    /// Store the session id
    pub fn set_session_id(&self, session_id: &SessionId) {
        self.with_store("Saving session id", |s| s.set_session_id(session_id))
    }

    /// Last nickname accepted by the server
    pub fn get_nickname(&self) -> Option<String> {
        self.with_store("Reading nickname", |s| s.get_nickname())
    }

    /// Mirror an accepted nickname
    pub fn set_nickname(&self, nickname: &str) {
        self.with_store("Saving nickname", |s| s.set_nickname(nickname))
    }

    /// Forget the nickname
    pub fn clear_nickname(&self) {
        self.with_store("Clearing nickname", |s| s.clear_nickname())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rl_core::KeyValueBackend;
    use std::sync::atomic::AtomicUsize;

    /// Backend that fails every call and counts attempts
    #[derive(Default)]
    pub(crate) struct BrokenBackend {
        pub(crate) calls: AtomicUsize,
    }

    impl KeyValueBackend for BrokenBackend {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("disk gone".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("disk gone".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("disk gone".to_string()))
        }
    }

    #[test]
    fn test_healthy_store_is_used_directly() {
        let durable = IdentityStore::in_memory();
        let scope = ActivationStore::new(durable.clone());

        scope.set_nickname("neo");

        assert!(!scope.is_degraded());
        assert_eq!(durable.get_nickname().unwrap().as_deref(), Some("neo"));
    }

    #[test]
    fn test_failure_degrades_for_rest_of_activation() {
        let backend = Arc::new(BrokenBackend::default());
        let scope = ActivationStore::new(IdentityStore::new(backend.clone()));
        let room = RoomId::new("r1");

        assert_eq!(scope.get_participant(&room), None);
        assert!(scope.is_degraded());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        scope.set_participant(&room, &ParticipantId::new("p1"));
        assert_eq!(scope.get_participant(&room), Some(ParticipantId::new("p1")));
        // Durable storage is not retried within the activation
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fallback_state_carries_into_next_activation() {
        let backend = Arc::new(BrokenBackend::default());
        let durable = IdentityStore::new(backend.clone());
        let room = RoomId::new("r1");

        let first = ActivationStore::new(durable.clone());
        first.set_session_id(&SessionId::new("s-1"));
        first.set_participant(&room, &ParticipantId::new("p1"));

        let second = ActivationStore::new(durable);
        assert_eq!(second.get_session_id(), Some(SessionId::new("s-1")));
        assert_eq!(second.get_participant(&room), Some(ParticipantId::new("p1")));
        // Each activation tried the durable store once before degrading
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_new_activation_retries_durable_store() {
        let backend = Arc::new(BrokenBackend::default());
        let durable = IdentityStore::new(backend.clone());

        ActivationStore::new(durable.clone()).clear_nickname();
        ActivationStore::new(durable).clear_nickname();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }
}
