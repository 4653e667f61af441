//! Room session lifecycle
//!
//! One controller per room activation. The state machine is
//!
//! ```text
//! Inactive -> AwaitingRestore -> Active -> Leaving -> Inactive
//!          \________________________^
//! ```
//!
//! Activation with a remembered participant pushes `restore_participant`
//! and waits for the server to settle it; there is no dedicated accept or
//! reject event, so the next `save_participant` or `clear_participant`
//! settles the attempt. If neither arrives before the restore timeout the
//! controller settles on its own and keeps the stored binding.
//!
//! History navigation, in-app page transitions and unload all lead to a
//! single `leave_room` push per activation, guarded by a [`LeaveLatch`].
//! Deactivation is not leaving: it removes the window listeners and pushes
//! nothing, so a remount is never mistaken for a departure.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use rl_core::{EventBridge, IdentityStore};
use rl_protocol::{ClearParticipant, ClientEvent, ParticipantBinding, RoomId};

use crate::bridge::push_if_connected;
use crate::signals::{HostSignals, SignalListener, TerminationSignal};
use crate::storage::ActivationStore;

/// Default time to wait for the server to settle a restore request
pub const DEFAULT_RESTORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle state of a room activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not activated, or already left
    Inactive,
    /// `restore_participant` pushed, waiting for save/clear
    AwaitingRestore,
    /// In the room
    Active,
    /// `leave_room` being pushed
    Leaving,
}

/// Result of handling a termination signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// `leave_room` was handed to the channel
    Sent,
    /// The latch fired but the channel was unavailable
    Unsent,
    /// An earlier signal in this activation already left
    DuplicateSuppressed,
    /// The controller is not activated
    NotMounted,
}

/// One-shot guard for the leave push; cleared only by a fresh activation
#[derive(Debug, Default)]
pub struct LeaveLatch {
    fired: bool,
}

impl LeaveLatch {
    /// Fire the latch; returns false if it had already fired
    pub fn try_fire(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }

    /// Whether the latch has fired
    pub fn is_fired(&self) -> bool {
        self.fired
    }

    /// Re-arm for a new activation
    pub fn reset(&mut self) {
        self.fired = false;
    }
}

/// Per-activation resources
struct Mount {
    store: ActivationStore,
    /// History-navigation and unload listener; dropped on leave or deactivation
    listener: Option<SignalListener>,
    restore_deadline: Option<Instant>,
}

/// Keeps a room's participant binding in step with the server
pub struct SessionLifecycleController {
    room_id: RoomId,
    store: IdentityStore,
    bridge: Arc<dyn EventBridge>,
    host: HostSignals,
    restore_timeout: Duration,
    state: LifecycleState,
    latch: LeaveLatch,
    mount: Option<Mount>,
}

impl SessionLifecycleController {
    /// Create an inactive controller for a room
    pub fn new(
        room_id: RoomId,
        store: IdentityStore,
        bridge: Arc<dyn EventBridge>,
        host: HostSignals,
    ) -> Self {
        Self {
            room_id,
            store,
            bridge,
            host,
            restore_timeout: DEFAULT_RESTORE_TIMEOUT,
            state: LifecycleState::Inactive,
            latch: LeaveLatch::default(),
            mount: None,
        }
    }

    /// Override the restore timeout
    pub fn with_restore_timeout(mut self, timeout: Duration) -> Self {
        self.restore_timeout = timeout;
        self
    }

    /// Room this controller is bound to
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether the controller is between activate and deactivate
    pub fn is_mounted(&self) -> bool {
        self.mount.is_some()
    }

    /// Whether the window listeners are currently registered
    pub fn is_listening(&self) -> bool {
        self.mount
            .as_ref()
            .is_some_and(|mount| mount.listener.is_some())
    }

    /// Whether this activation has already left the room
    pub fn has_left(&self) -> bool {
        self.latch.is_fired()
    }

    /// When an unsettled restore request gives up, if one is pending
    pub fn restore_deadline(&self) -> Option<Instant> {
        self.mount.as_ref().and_then(|mount| mount.restore_deadline)
    }

    /// Activate for the room: register termination listeners and request
    /// restoration of a remembered participant
    pub fn activate(&mut self) -> LifecycleState {
        if self.mount.is_some() {
            tracing::debug!("Room {} already active", self.room_id);
            return self.state;
        }

        self.latch.reset();
        let store = ActivationStore::new(self.store.clone());
        let listener = self.host.listen(&TerminationSignal::WINDOW_SCOPED);
        let mut restore_deadline = None;

        self.state = match store.get_participant(&self.room_id) {
            Some(participant_id) => {
                tracing::info!(
                    "Restoring participant {} in room {}",
                    participant_id,
                    self.room_id
                );
                match push_if_connected(
                    self.bridge.as_ref(),
                    ClientEvent::restore(self.room_id.clone(), participant_id),
                ) {
                    Ok(()) => {
                        restore_deadline = Some(Instant::now() + self.restore_timeout);
                        LifecycleState::AwaitingRestore
                    }
                    Err(e) => {
                        tracing::warn!("Restore request for room {} not sent: {}", self.room_id, e);
                        LifecycleState::Active
                    }
                }
            }
            None => {
                tracing::info!("No stored participant for room {}", self.room_id);
                LifecycleState::Active
            }
        };

        self.mount = Some(Mount {
            store,
            listener: Some(listener),
            restore_deadline,
        });
        self.state
    }

    /// Handle `save_participant`
    pub fn on_save_participant(&mut self, binding: &ParticipantBinding) {
        let Some(mount) = &self.mount else {
            tracing::debug!("Ignoring save_participant while not mounted");
            return;
        };

        tracing::debug!(
            "Saving participant {} for room {}",
            binding.participant_id,
            binding.room_id
        );
        mount
            .store
            .set_participant(&binding.room_id, &binding.participant_id);
        self.settle_restore();
    }

    /// Handle `clear_participant`
    pub fn on_clear_participant(&mut self, payload: &ClearParticipant) {
        let Some(mount) = &self.mount else {
            tracing::debug!("Ignoring clear_participant while not mounted");
            return;
        };

        tracing::debug!("Clearing participant for room {}", payload.room_id);
        mount.store.clear_participant(&payload.room_id);
        self.settle_restore();
    }

    fn settle_restore(&mut self) {
        if let Some(mount) = self.mount.as_mut() {
            mount.restore_deadline = None;
        }
        if self.state == LifecycleState::AwaitingRestore {
            tracing::info!("Restore settled for room {}", self.room_id);
            self.state = LifecycleState::Active;
        }
    }

    /// Give up waiting for the server to answer a restore request
    ///
    /// The stored binding is kept; the server stays the arbiter and the next
    /// activation asks again.
    pub fn restore_timed_out(&mut self) {
        if self.state != LifecycleState::AwaitingRestore {
            return;
        }
        tracing::warn!(
            "No answer to restore request for room {} within {:?}; continuing without it",
            self.room_id,
            self.restore_timeout
        );
        if let Some(mount) = self.mount.as_mut() {
            mount.restore_deadline = None;
        }
        self.state = LifecycleState::Active;
    }

    /// Handle a termination signal: push `leave_room` once per activation
    pub fn on_termination(&mut self, signal: TerminationSignal) -> LeaveOutcome {
        let Some(mount) = self.mount.as_mut() else {
            tracing::debug!("Ignoring {} while not mounted", signal);
            return LeaveOutcome::NotMounted;
        };

        if !self.latch.try_fire() {
            tracing::debug!("Duplicate leave from {} suppressed", signal);
            return LeaveOutcome::DuplicateSuppressed;
        }

        tracing::info!("Leaving room {} ({})", self.room_id, signal);
        self.state = LifecycleState::Leaving;

        let outcome = match push_if_connected(self.bridge.as_ref(), ClientEvent::leave()) {
            Ok(()) => LeaveOutcome::Sent,
            Err(e) => {
                tracing::warn!("Leave for room {} not sent: {}", self.room_id, e);
                LeaveOutcome::Unsent
            }
        };

        mount.listener = None;
        mount.restore_deadline = None;
        self.state = LifecycleState::Inactive;
        outcome
    }

    /// Wait for the next window signal
    ///
    /// Pending forever while no listener is registered, so it can sit in a
    /// `select!` next to other branches.
    pub async fn next_signal(&mut self) -> Option<TerminationSignal> {
        let Some(listener) = self.mount.as_mut().and_then(|m| m.listener.as_mut()) else {
            return std::future::pending().await;
        };

        let signal = listener.recv().await;
        if signal.is_none() {
            tracing::debug!("Host signal hub closed");
            if let Some(mount) = self.mount.as_mut() {
                mount.listener = None;
            }
        }
        signal
    }

    /// Handle every window signal queued so far, in arrival order
    pub fn drain_signals(&mut self) -> Vec<(TerminationSignal, LeaveOutcome)> {
        let queued: Vec<TerminationSignal> =
            match self.mount.as_mut().and_then(|m| m.listener.as_mut()) {
                Some(listener) => std::iter::from_fn(|| listener.try_recv()).collect(),
                None => Vec::new(),
            };

        queued
            .into_iter()
            .map(|signal| (signal, self.on_termination(signal)))
            .collect()
    }

    /// Deactivate without leaving: drop the listeners, push nothing
    pub fn deactivate(&mut self) {
        if self.mount.take().is_some() {
            tracing::debug!("Room {} deactivated", self.room_id);
        }
        self.state = LifecycleState::Inactive;
    }
}
