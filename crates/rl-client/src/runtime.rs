//! Room runtime
//!
//! Drives one activation of both controllers over one bridge connection:
//! server events are dispatched to the controller that owns them, window
//! signals turn into a leave, the restore timeout is enforced, and
//! side-channel nickname writes run in the background so a slow server
//! never stalls event handling.

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use rl_core::NicknameUpdateError;
use rl_protocol::{ServerEvent, SessionNicknameUpdate};

use crate::lifecycle::{LeaveOutcome, SessionLifecycleController};
use crate::nickname::NicknameSessionController;
use crate::signals::TerminationSignal;

/// Something the embedding application may want to show or log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientNotice {
    /// A termination signal was handled
    Left {
        signal: TerminationSignal,
        outcome: LeaveOutcome,
    },
    /// The server did not settle a restore request in time
    RestoreTimedOut,
    /// A side-channel nickname write was accepted
    NicknameUpdated { nickname: String },
    /// A side-channel nickname write failed; the stored nickname is unchanged
    NicknameUpdateFailed { nickname: String, error: String },
}

/// Why [`RoomRuntime::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The server side of the bridge went away
    ChannelClosed,
    /// The runtime was asked to stop
    Shutdown,
}

type UpdateReply = oneshot::Sender<Result<(), NicknameUpdateError>>;

enum RuntimeCommand {
    PageTransition,
    UpdateNickname { nickname: String, reply: UpdateReply },
}

/// Handle for talking to a running [`RoomRuntime`]
#[derive(Clone)]
pub struct RuntimeHandle {
    commands: mpsc::UnboundedSender<RuntimeCommand>,
    cancel: CancellationToken,
}

impl RuntimeHandle {
    /// Report that the host application started an in-app page transition
    ///
    /// Returns false if the runtime is no longer running.
    pub fn page_transition_started(&self) -> bool {
        self.commands.send(RuntimeCommand::PageTransition).is_ok()
    }

    /// Ask the server to set the nickname for the current session
    pub async fn update_nickname(
        &self,
        nickname: impl Into<String>,
    ) -> Result<(), NicknameUpdateError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(RuntimeCommand::UpdateNickname {
                nickname: nickname.into(),
                reply,
            })
            .map_err(|_| NicknameUpdateError::Inactive)?;

        rx.await.unwrap_or(Err(NicknameUpdateError::Inactive))
    }

    /// Stop the runtime without leaving the room
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Event loop for one room activation
pub struct RoomRuntime {
    lifecycle: SessionLifecycleController,
    nickname: NicknameSessionController,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    commands: mpsc::UnboundedReceiver<RuntimeCommand>,
    cancel: CancellationToken,
    updates: JoinSet<(String, Option<String>)>,
    notices: Option<mpsc::UnboundedSender<ClientNotice>>,
}

impl RoomRuntime {
    /// Create a runtime and the handle that controls it
    pub fn new(
        lifecycle: SessionLifecycleController,
        nickname: NicknameSessionController,
        events: mpsc::UnboundedReceiver<ServerEvent>,
        cancel: CancellationToken,
    ) -> (Self, RuntimeHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handle = RuntimeHandle {
            commands: command_tx,
            cancel: cancel.clone(),
        };
        let runtime = Self {
            lifecycle,
            nickname,
            events,
            commands: command_rx,
            cancel,
            updates: JoinSet::new(),
            notices: None,
        };
        (runtime, handle)
    }

    /// Send notices to the given channel
    pub fn with_notices(mut self, tx: mpsc::UnboundedSender<ClientNotice>) -> Self {
        self.notices = Some(tx);
        self
    }

    /// Room lifecycle controller driven by this runtime
    pub fn lifecycle(&self) -> &SessionLifecycleController {
        &self.lifecycle
    }

    /// Nickname session controller driven by this runtime
    pub fn nickname(&self) -> &NicknameSessionController {
        &self.nickname
    }

    /// Activate both controllers and run until the channel closes or the
    /// runtime is shut down
    ///
    /// Both controllers are deactivated before returning, and any nickname
    /// write still in flight is awaited.
    pub async fn run(&mut self) -> StopReason {
        self.lifecycle.activate();
        let session_id = self.nickname.activate();
        tracing::info!(
            "Room {} running with session {}",
            self.lifecycle.room_id(),
            session_id
        );

        let reason = loop {
            let deadline = self.lifecycle.restore_deadline();

            tokio::select! {
                _ = self.cancel.cancelled() => break StopReason::Shutdown,

                event = self.events.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break StopReason::ChannelClosed,
                },

                Some(signal) = self.lifecycle.next_signal() => self.leave(signal),

                _ = sleep_until(deadline) => {
                    self.lifecycle.restore_timed_out();
                    self.notify(ClientNotice::RestoreTimedOut);
                }

                Some(command) = self.commands.recv() => self.handle_command(command),

                Some(joined) = self.updates.join_next() => self.finish_update(joined),
            }
        };

        tracing::info!("Room {} stopping: {:?}", self.lifecycle.room_id(), reason);

        // An unload may have raced the shutdown
        for (signal, outcome) in self.lifecycle.drain_signals() {
            self.notify(ClientNotice::Left { signal, outcome });
        }
        self.lifecycle.deactivate();
        self.nickname.deactivate();

        while let Some(joined) = self.updates.join_next().await {
            self.finish_update(joined);
        }

        reason
    }

    fn dispatch(&mut self, event: ServerEvent) {
        tracing::debug!("Received {}", event.kind().as_str());

        match event {
            ServerEvent::SaveParticipant(binding) => self.lifecycle.on_save_participant(&binding),
            ServerEvent::ClearParticipant(payload) => {
                self.lifecycle.on_clear_participant(&payload)
            }
            ServerEvent::SaveNickname(payload) => self.nickname.on_save_nickname(&payload),
            ServerEvent::ClearNickname(_) => self.nickname.on_clear_nickname(),
            ServerEvent::UpdateSessionNickname(update) => self.spawn_update(update, None),
        }
    }

    fn handle_command(&mut self, command: RuntimeCommand) {
        match command {
            RuntimeCommand::PageTransition => self.leave(TerminationSignal::PageTransition),
            RuntimeCommand::UpdateNickname { nickname, reply } => {
                match self.nickname.session_id() {
                    Some(session_id) => {
                        let update = SessionNicknameUpdate {
                            nickname,
                            session_id: session_id.clone(),
                        };
                        self.spawn_update(update, Some(reply));
                    }
                    None => {
                        let _ = reply.send(Err(NicknameUpdateError::Inactive));
                    }
                }
            }
        }
    }

    fn leave(&mut self, signal: TerminationSignal) {
        let outcome = self.lifecycle.on_termination(signal);
        self.notify(ClientNotice::Left { signal, outcome });
    }

    fn spawn_update(&mut self, update: SessionNicknameUpdate, reply: Option<UpdateReply>) {
        let Some(updater) = self.nickname.updater() else {
            tracing::debug!("Ignoring nickname update while not mounted");
            if let Some(reply) = reply {
                let _ = reply.send(Err(NicknameUpdateError::Inactive));
            }
            return;
        };

        self.updates.spawn(async move {
            let nickname = update.nickname.clone();
            let result = updater.apply(update).await;
            let failure = result.as_ref().err().map(ToString::to_string);
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
            (nickname, failure)
        });
    }

    fn finish_update(&mut self, joined: Result<(String, Option<String>), JoinError>) {
        let notice = match joined {
            Ok((nickname, None)) => ClientNotice::NicknameUpdated { nickname },
            Ok((nickname, Some(error))) => ClientNotice::NicknameUpdateFailed { nickname, error },
            Err(e) => {
                tracing::error!("Nickname update task failed: {}", e);
                return;
            }
        };
        self.notify(notice);
    }

    fn notify(&self, notice: ClientNotice) {
        if let Some(tx) = &self.notices {
            let _ = tx.send(notice);
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
