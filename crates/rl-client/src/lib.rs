//! rl-client: Chat-room participant session client
//!
//! Keeps a per-room participant identity alive across reloads and
//! reconnects, tells the server when the participant has really left, and
//! keeps the chosen nickname consistent between the local identity store
//! and the server-held session.

pub mod bridge;
pub mod endpoint;
pub mod lifecycle;
pub mod nickname;
pub mod reconnect;
pub mod runtime;
pub mod signals;
pub mod storage;

pub use bridge::{BridgeConnection, ChannelBridge, ServerEnds, TcpBridge};
pub use endpoint::HttpNicknameEndpoint;
pub use lifecycle::{LeaveLatch, LeaveOutcome, LifecycleState, SessionLifecycleController};
pub use nickname::{NicknameSessionController, NicknameUpdater};
pub use reconnect::ExponentialBackoff;
pub use runtime::{ClientNotice, RoomRuntime, RuntimeHandle, StopReason};
pub use signals::{HostSignals, SignalListener, TerminationSignal};
pub use storage::ActivationStore;
