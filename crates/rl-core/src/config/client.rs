//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_millis;

/// Configuration for the chat-room client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Event bridge address (host:port)
    pub server_address: String,

    /// How long to wait for the server to settle a restore request
    #[serde(with = "duration_millis")]
    pub restore_timeout: Duration,

    /// How long to keep the channel open after an unload-triggered leave
    #[serde(with = "duration_millis")]
    pub leave_grace: Duration,

    /// Where identity state is persisted
    pub store: StoreConfig,

    /// Nickname side channel
    pub nickname_endpoint: NicknameEndpointConfig,

    /// Backoff configuration for reconnections
    pub backoff: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:4000".to_string(),
            restore_timeout: Duration::from_secs(10),
            leave_grace: Duration::from_millis(500),
            store: StoreConfig::default(),
            nickname_endpoint: NicknameEndpointConfig::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Identity store backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Keep identity only for the life of the process
    Memory,
    /// Persist identity to a JSON file
    File {
        /// Path of the store file
        path: PathBuf,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: super::default_config_dir().join("identity.json"),
        }
    }
}

/// Nickname side-channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NicknameEndpointConfig {
    /// Base URL of the HTTP server
    pub base_url: String,

    /// Request path for nickname writes
    pub path: String,

    /// CSRF token sent as `X-CSRF-Token`, if the server requires one
    pub csrf_token: Option<String>,

    /// Per-request timeout
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl Default for NicknameEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4000".to_string(),
            path: "/chat/set_nickname".to_string(),
            csrf_token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl NicknameEndpointConfig {
    /// Full URL of the nickname endpoint
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_millis")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_millis")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            server_address = "10.0.0.5:4000"
            restore_timeout = 2500

            [store]
            backend = "file"
            path = "/tmp/roomlink/identity.json"

            [nickname_endpoint]
            base_url = "https://chat.example/"
            csrf_token = "tok"
            "#,
        )
        .unwrap();

        assert_eq!(config.server_address, "10.0.0.5:4000");
        assert_eq!(config.restore_timeout, Duration::from_millis(2500));
        assert_eq!(config.leave_grace, Duration::from_millis(500));
        match config.store {
            StoreConfig::File { path } => {
                assert_eq!(path, PathBuf::from("/tmp/roomlink/identity.json"))
            }
            other => panic!("Expected file store, got {:?}", other),
        }
        assert_eq!(
            config.nickname_endpoint.url(),
            "https://chat.example/chat/set_nickname"
        );
        assert_eq!(config.nickname_endpoint.csrf_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_memory_store_config() {
        let config: ClientConfig = toml::from_str("[store]\nbackend = \"memory\"\n").unwrap();
        assert!(matches!(config.store, StoreConfig::Memory));
    }
}
