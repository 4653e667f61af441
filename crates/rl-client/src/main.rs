//! roomlink client
//!
//! Joins a chat room over the TCP event bridge, restores the remembered
//! participant for that room, announces the session, and keeps the nickname
//! in step with the server. Ctrl-C is treated as unloading the page: the
//! client leaves the room, gives the leave a moment to reach the server,
//! then exits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rl_client::{
    ClientNotice, ExponentialBackoff, HostSignals, HttpNicknameEndpoint,
    NicknameSessionController, RoomRuntime, SessionLifecycleController, StopReason, TcpBridge,
    TerminationSignal,
};
use rl_core::config::{self, ClientConfig, StoreConfig};
use rl_core::{FileBackend, IdentityStore, NicknameEndpoint, NicknameUpdateError};
use rl_protocol::RoomId;

#[derive(Parser)]
#[command(name = "rl-client")]
#[command(about = "roomlink client - keeps a chat-room identity alive across reconnects")]
#[command(version)]
struct Args {
    /// Room to join
    #[arg(short, long)]
    room: String,

    /// Event bridge address (host:port)
    #[arg(short, long)]
    server: Option<String>,

    /// Ask the server for this nickname once connected
    #[arg(short, long)]
    nickname: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep identity in memory only
    #[arg(long)]
    memory_store: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("roomlink client starting...");

    // Load configuration
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);

    let mut config = if config_path.exists() {
        config::load_config(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", config_path, e);
            ClientConfig::default()
        })
    } else {
        ClientConfig::default()
    };

    // Apply command-line overrides
    if let Some(server) = args.server {
        config.server_address = server;
    }
    if args.memory_store {
        config.store = StoreConfig::Memory;
    }

    let room_id = RoomId::new(args.room);
    let store = build_store(&config.store);
    let endpoint: Arc<dyn NicknameEndpoint> = Arc::new(
        HttpNicknameEndpoint::new(&config.nickname_endpoint)
            .context("Failed to create nickname endpoint client")?,
    );
    let host = HostSignals::new();
    let shutdown = CancellationToken::new();

    spawn_ctrl_c_handler(host.clone(), shutdown.clone(), config.leave_grace);

    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    tokio::spawn(log_notices(notice_rx));

    let mut pending_nickname = args.nickname;
    let mut backoff = ExponentialBackoff::from_config(&config.backoff);

    // Main loop with reconnection
    while !shutdown.is_cancelled() {
        let connection = match TcpBridge::connect(&config.server_address).await {
            Ok(connection) => connection,
            Err(e) => {
                let delay = backoff.next_delay();
                tracing::warn!("{}; retrying in {:?}", e, delay);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => continue,
                }
            }
        };
        backoff.reset();

        let lifecycle = SessionLifecycleController::new(
            room_id.clone(),
            store.clone(),
            Arc::clone(&connection.bridge),
            host.clone(),
        )
        .with_restore_timeout(config.restore_timeout);
        let nickname =
            NicknameSessionController::new(store.clone(), connection.bridge, Arc::clone(&endpoint));

        let (runtime, handle) =
            RoomRuntime::new(lifecycle, nickname, connection.events, shutdown.child_token());
        let mut runtime = runtime.with_notices(notice_tx.clone());

        let nickname_request = pending_nickname.clone().map(|nickname| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.update_nickname(nickname).await })
        });

        let reason = runtime.run().await;
        // Releases any nickname command the runtime never picked up
        drop(runtime);

        if let Some(request) = nickname_request {
            let result = request
                .await
                .unwrap_or_else(|e| Err(NicknameUpdateError::Request(e.to_string())));
            settle_nickname_request(&mut pending_nickname, result);
        }

        match reason {
            StopReason::Shutdown => break,
            StopReason::ChannelClosed => {
                let delay = backoff.next_delay();
                tracing::warn!("Disconnected from {}; reconnecting in {:?}", config.server_address, delay);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    tracing::info!("roomlink client stopped");
    Ok(())
}

/// Keep a `--nickname` request queued until a runtime has actually handled it
fn settle_nickname_request(
    pending: &mut Option<String>,
    result: Result<(), NicknameUpdateError>,
) {
    match result {
        Ok(()) => *pending = None,
        Err(NicknameUpdateError::Inactive) => {
            tracing::debug!("Nickname request not handled before disconnect; will retry");
        }
        Err(e) => {
            if let Some(nickname) = pending.take() {
                tracing::error!("Could not set nickname {:?}: {}", nickname, e);
            }
        }
    }
}

/// Build the identity store selected by configuration
fn build_store(config: &StoreConfig) -> IdentityStore {
    match config {
        StoreConfig::Memory => {
            tracing::info!("Using in-memory identity store");
            IdentityStore::in_memory()
        }
        StoreConfig::File { path } => {
            tracing::info!("Using identity store at {:?}", path);
            IdentityStore::new(Arc::new(FileBackend::new(path.clone())))
        }
    }
}

/// Treat Ctrl-C as the page unloading
fn spawn_ctrl_c_handler(host: HostSignals, shutdown: CancellationToken, leave_grace: Duration) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }

        tracing::info!("Interrupted, leaving room");
        if host.emit(TerminationSignal::Unload) > 0 {
            tokio::time::sleep(leave_grace).await;
        }
        shutdown.cancel();
    });
}

async fn log_notices(mut notices: mpsc::UnboundedReceiver<ClientNotice>) {
    while let Some(notice) = notices.recv().await {
        match notice {
            ClientNotice::Left { signal, outcome } => {
                tracing::info!("Left room on {}: {:?}", signal, outcome);
            }
            ClientNotice::RestoreTimedOut => {
                tracing::warn!("Server did not answer the restore request");
            }
            ClientNotice::NicknameUpdated { nickname } => {
                tracing::info!("Nickname is now {:?}", nickname);
            }
            ClientNotice::NicknameUpdateFailed { nickname, error } => {
                tracing::warn!("Nickname {:?} was not accepted: {}", nickname, error);
            }
        }
    }
}
