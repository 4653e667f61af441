//! Nickname session controller
//!
//! Establishes the durable session identifier, re-announces it on every
//! activation, and mirrors server nickname decisions into the identity
//! store. Nickname writes initiated from the server go through the side
//! channel first; the local mirror only changes once the server has
//! acknowledged the write.

use std::sync::Arc;

use rl_core::{EventBridge, IdentityStore, NicknameEndpoint, NicknameUpdateError};
use rl_protocol::{ClientEvent, NicknamePayload, SessionId, SessionNicknameUpdate};

use crate::bridge::push_if_connected;
use crate::storage::ActivationStore;

struct Mount {
    store: ActivationStore,
    session_id: SessionId,
}

/// Keeps the session identifier and nickname in step with the server
pub struct NicknameSessionController {
    store: IdentityStore,
    bridge: Arc<dyn EventBridge>,
    endpoint: Arc<dyn NicknameEndpoint>,
    mount: Option<Mount>,
}

impl NicknameSessionController {
    /// Create an inactive controller
    pub fn new(
        store: IdentityStore,
        bridge: Arc<dyn EventBridge>,
        endpoint: Arc<dyn NicknameEndpoint>,
    ) -> Self {
        Self {
            store,
            bridge,
            endpoint,
            mount: None,
        }
    }

    /// Session id announced by the current activation
    pub fn session_id(&self) -> Option<&SessionId> {
        self.mount.as_ref().map(|mount| &mount.session_id)
    }

    /// Whether the controller is between activate and deactivate
    pub fn is_mounted(&self) -> bool {
        self.mount.is_some()
    }

    /// Load or create the session id and announce it to the server
    ///
    /// `set_session_id` is pushed exactly once per activation; calling this
    /// again before [`deactivate`](Self::deactivate) returns the same id
    /// without pushing.
    pub fn activate(&mut self) -> SessionId {
        if let Some(mount) = &self.mount {
            return mount.session_id.clone();
        }

        let store = ActivationStore::new(self.store.clone());
        let session_id = match store.get_session_id() {
            Some(session_id) => session_id,
            None => {
                let session_id = SessionId::generate();
                tracing::info!("Created session {}", session_id);
                store.set_session_id(&session_id);
                session_id
            }
        };

        let announcement = ClientEvent::announce(session_id.clone());
        if let Err(e) = push_if_connected(self.bridge.as_ref(), announcement) {
            tracing::warn!("Session announcement not sent: {}", e);
        }

        self.mount = Some(Mount {
            store,
            session_id: session_id.clone(),
        });
        session_id
    }

    /// Handle `save_nickname`
    pub fn on_save_nickname(&mut self, payload: &NicknamePayload) {
        match &self.mount {
            Some(mount) => {
                tracing::debug!("Saving nickname {:?}", payload.nickname);
                mount.store.set_nickname(&payload.nickname);
            }
            None => tracing::debug!("Ignoring save_nickname while not mounted"),
        }
    }

    /// Handle `clear_nickname`
    pub fn on_clear_nickname(&mut self) {
        match &self.mount {
            Some(mount) => {
                tracing::debug!("Clearing nickname");
                mount.store.clear_nickname();
            }
            None => tracing::debug!("Ignoring clear_nickname while not mounted"),
        }
    }

    /// Side-channel updater bound to this activation
    pub fn updater(&self) -> Option<NicknameUpdater> {
        self.mount.as_ref().map(|mount| NicknameUpdater {
            endpoint: Arc::clone(&self.endpoint),
            store: mount.store.clone(),
        })
    }

    /// Set the nickname for this activation's session
    pub async fn update_nickname(
        &self,
        nickname: impl Into<String>,
    ) -> Result<(), NicknameUpdateError> {
        let (Some(updater), Some(session_id)) = (self.updater(), self.session_id()) else {
            return Err(NicknameUpdateError::Inactive);
        };

        updater
            .apply(SessionNicknameUpdate {
                nickname: nickname.into(),
                session_id: session_id.clone(),
            })
            .await
    }

    /// Deactivate; the next activation re-announces the session
    pub fn deactivate(&mut self) {
        self.mount = None;
    }
}

/// Performs one acknowledged nickname write, then mirrors it locally
#[derive(Clone)]
pub struct NicknameUpdater {
    endpoint: Arc<dyn NicknameEndpoint>,
    store: ActivationStore,
}

impl NicknameUpdater {
    /// Send the update through the side channel; on success mirror it
    ///
    /// On failure the stored nickname is left untouched and the error is
    /// returned. No retry is attempted.
    pub async fn apply(&self, update: SessionNicknameUpdate) -> Result<(), NicknameUpdateError> {
        tracing::debug!(
            "Updating nickname to {:?} for session {}",
            update.nickname,
            update.session_id
        );

        if let Err(e) = self.endpoint.set_nickname(&update).await {
            tracing::warn!("Nickname update to {:?} failed: {}", update.nickname, e);
            return Err(e);
        }

        self.store.set_nickname(&update.nickname);
        tracing::info!("Nickname updated to {:?}", update.nickname);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bridge::{ChannelBridge, ServerEnds};
    use crate::storage::tests::BrokenBackend;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Endpoint that records requests and answers from a script
    #[derive(Default)]
    pub(crate) struct ScriptedEndpoint {
        pub(crate) requests: Mutex<Vec<SessionNicknameUpdate>>,
        pub(crate) reject_with: Option<u16>,
    }

    impl ScriptedEndpoint {
        pub(crate) fn rejecting(status: u16) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                reject_with: Some(status),
            }
        }
    }

    #[async_trait]
    impl NicknameEndpoint for ScriptedEndpoint {
        async fn set_nickname(
            &self,
            update: &SessionNicknameUpdate,
        ) -> Result<(), NicknameUpdateError> {
            self.requests.lock().unwrap().push(update.clone());
            match self.reject_with {
                Some(status) => Err(NicknameUpdateError::Status(status)),
                None => Ok(()),
            }
        }
    }

    fn controller(
        store: &IdentityStore,
        endpoint: Arc<ScriptedEndpoint>,
    ) -> (NicknameSessionController, ServerEnds) {
        let (connection, server) = ChannelBridge::pair();
        (
            NicknameSessionController::new(store.clone(), connection.bridge, endpoint),
            server,
        )
    }

    #[test]
    fn test_first_activation_generates_and_persists() {
        let store = IdentityStore::in_memory();
        let (mut controller, mut server) = controller(&store, Arc::default());

        let session_id = controller.activate();

        assert_eq!(store.get_session_id().unwrap(), Some(session_id.clone()));
        assert_eq!(server.drain(), vec![ClientEvent::announce(session_id)]);
    }

    #[test]
    fn test_session_id_is_stable_across_activations() {
        let store = IdentityStore::in_memory();
        let (mut controller, mut server) = controller(&store, Arc::default());

        let first = controller.activate();
        controller.deactivate();
        let second = controller.activate();

        assert_eq!(first, second);
        assert_eq!(
            server.drain(),
            vec![
                ClientEvent::announce(first.clone()),
                ClientEvent::announce(first)
            ]
        );
    }

    #[test]
    fn test_session_id_is_stable_while_storage_is_broken() {
        let store = IdentityStore::new(Arc::new(BrokenBackend::default()));
        let (mut first, mut first_server) = controller(&store, Arc::default());
        let (mut second, mut second_server) = controller(&store, Arc::default());

        let first_id = first.activate();
        first.deactivate();
        let again = first.activate();
        let second_id = second.activate();

        assert_eq!(first_id, again);
        assert_eq!(first_id, second_id);
        assert_eq!(
            first_server.drain(),
            vec![
                ClientEvent::announce(first_id.clone()),
                ClientEvent::announce(first_id.clone())
            ]
        );
        assert_eq!(second_server.drain(), vec![ClientEvent::announce(first_id)]);
    }

    #[test]
    fn test_announce_once_per_activation() {
        let store = IdentityStore::in_memory();
        let (mut controller, mut server) = controller(&store, Arc::default());

        controller.activate();
        controller.activate();

        assert_eq!(server.drain().len(), 1);
    }

    #[test]
    fn test_existing_session_id_is_reused() {
        let store = IdentityStore::in_memory();
        store.set_session_id(&SessionId::new("kept")).unwrap();
        let (mut controller, _server) = controller(&store, Arc::default());

        assert_eq!(controller.activate(), SessionId::new("kept"));
    }

    #[test]
    fn test_save_and_clear_nickname() {
        let store = IdentityStore::in_memory();
        let (mut controller, _server) = controller(&store, Arc::default());
        controller.activate();

        controller.on_save_nickname(&NicknamePayload {
            nickname: "neo".to_string(),
        });
        assert_eq!(store.get_nickname().unwrap().as_deref(), Some("neo"));

        controller.on_clear_nickname();
        assert_eq!(store.get_nickname().unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_success_mirrors_nickname() {
        let store = IdentityStore::in_memory();
        let endpoint = Arc::new(ScriptedEndpoint::default());
        let (mut controller, _server) = controller(&store, endpoint.clone());
        let session_id = controller.activate();

        controller.update_nickname("morpheus").await.unwrap();

        assert_eq!(store.get_nickname().unwrap().as_deref(), Some("morpheus"));
        let requests = endpoint.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].session_id, session_id);
    }

    #[tokio::test]
    async fn test_update_failure_leaves_nickname_untouched() {
        let store = IdentityStore::in_memory();
        store.set_nickname("before").unwrap();
        let (mut controller, _server) =
            controller(&store, Arc::new(ScriptedEndpoint::rejecting(409)));
        controller.activate();

        let result = controller.update_nickname("after").await;

        assert!(matches!(result, Err(NicknameUpdateError::Status(409))));
        assert_eq!(store.get_nickname().unwrap().as_deref(), Some("before"));
    }

    #[tokio::test]
    async fn test_update_requires_activation() {
        let store = IdentityStore::in_memory();
        let endpoint = Arc::new(ScriptedEndpoint::default());
        let (controller, _server) = controller(&store, endpoint.clone());

        let result = controller.update_nickname("ghost").await;

        assert!(matches!(result, Err(NicknameUpdateError::Inactive)));
        assert!(endpoint.requests.lock().unwrap().is_empty());
    }
}
