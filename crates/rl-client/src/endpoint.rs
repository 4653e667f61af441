//! HTTP nickname side channel

use async_trait::async_trait;
use reqwest::Client;

use rl_core::config::NicknameEndpointConfig;
use rl_core::{NicknameEndpoint, NicknameUpdateError};
use rl_protocol::SessionNicknameUpdate;

/// Nickname endpoint reached with an idempotent GET request
///
/// `GET {url}?nickname=..&session_id=..`, optionally carrying an
/// `X-CSRF-Token` header. Any 2xx status counts as accepted.
#[derive(Debug, Clone)]
pub struct HttpNicknameEndpoint {
    client: Client,
    url: String,
    csrf_token: Option<String>,
}

impl HttpNicknameEndpoint {
    /// Build an endpoint from configuration
    pub fn new(config: &NicknameEndpointConfig) -> Result<Self, NicknameUpdateError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NicknameUpdateError::Request(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url(),
            csrf_token: config.csrf_token.clone(),
        })
    }

    /// Request URL (without query)
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NicknameEndpoint for HttpNicknameEndpoint {
    async fn set_nickname(
        &self,
        update: &SessionNicknameUpdate,
    ) -> Result<(), NicknameUpdateError> {
        let mut request = self.client.get(&self.url).query(&[
            ("nickname", update.nickname.as_str()),
            ("session_id", update.session_id.as_str()),
        ]);

        if let Some(token) = &self.csrf_token {
            request = request.header("X-CSRF-Token", token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                NicknameUpdateError::Timeout
            } else {
                NicknameUpdateError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NicknameUpdateError::Status(status.as_u16()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Received {
        requests: Arc<Mutex<Vec<(HashMap<String, String>, Option<String>)>>>,
    }

    async fn set_nickname(
        State(received): State<Received>,
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> StatusCode {
        let token = headers
            .get("x-csrf-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let taken = params.get("nickname").map(String::as_str) == Some("taken");
        received.requests.lock().unwrap().push((params, token));

        if taken {
            StatusCode::CONFLICT
        } else {
            StatusCode::OK
        }
    }

    async fn serve() -> (String, Received) {
        let received = Received::default();
        let app = Router::new()
            .route("/chat/set_nickname", get(set_nickname))
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", address), received)
    }

    fn endpoint(base_url: String, csrf_token: Option<&str>) -> HttpNicknameEndpoint {
        HttpNicknameEndpoint::new(&NicknameEndpointConfig {
            base_url,
            csrf_token: csrf_token.map(str::to_string),
            timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap()
    }

    fn update(nickname: &str) -> SessionNicknameUpdate {
        SessionNicknameUpdate {
            nickname: nickname.to_string(),
            session_id: "s-1".into(),
        }
    }

    #[tokio::test]
    async fn test_successful_update_sends_query_and_token() {
        let (base_url, received) = serve().await;
        let endpoint = endpoint(base_url, Some("csrf-123"));

        endpoint.set_nickname(&update("neo")).await.unwrap();

        let requests = received.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (params, token) = &requests[0];
        assert_eq!(params.get("nickname").map(String::as_str), Some("neo"));
        assert_eq!(params.get("session_id").map(String::as_str), Some("s-1"));
        assert_eq!(token.as_deref(), Some("csrf-123"));
    }

    #[tokio::test]
    async fn test_rejected_update_reports_status() {
        let (base_url, _received) = serve().await;
        let endpoint = endpoint(base_url, None);

        let result = endpoint.set_nickname(&update("taken")).await;

        assert!(matches!(result, Err(NicknameUpdateError::Status(409))));
    }

    #[tokio::test]
    async fn test_unknown_path_is_a_failure() {
        let (base_url, _received) = serve().await;
        let endpoint = HttpNicknameEndpoint::new(&NicknameEndpointConfig {
            base_url,
            path: "/elsewhere".to_string(),
            ..Default::default()
        })
        .unwrap();

        let result = endpoint.set_nickname(&update("neo")).await;

        assert!(matches!(result, Err(NicknameUpdateError::Status(404))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_request_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = endpoint(format!("http://{}", address), None);
        let result = endpoint.set_nickname(&update("neo")).await;

        assert!(matches!(result, Err(NicknameUpdateError::Request(_))));
    }
}
