//! Authenticated HTTP client for the RideLink REST API.
//!
//! Every request carries the stored bearer token and session headers. When a
//! request comes back 401 the client refreshes the access token once and
//! replays the request. Concurrent 401s share a single refresh: the first
//! caller performs it and the rest park on a queue until it settles.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use rl_core::config::ServerConfig;
use rl_core::error::{RlError, RlResult};
use rl_models::Credential;

use crate::credentials::CredentialStore;
use crate::response::{self, TokenPair};

/// Outcome delivered to parked requests: the new access token, or the
/// refresh failure message.
type RefreshOutcome = Result<String, String>;

#[derive(Default)]
struct RefreshState {
    is_refreshing: bool,
    queue: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// REST client bound to one credential store.
#[derive(Clone)]
pub struct AuthClient {
    inner: Client,
    /// Base URL for the API (e.g. "https://api.example.com/api").
    base_url: String,
    refresh_path: String,
    timeout: Duration,
    store: Arc<dyn CredentialStore>,
    refresh: Arc<Mutex<RefreshState>>,
}

impl AuthClient {
    /// Create a new AuthClient from server configuration.
    pub fn new(config: &ServerConfig, store: Arc<dyn CredentialStore>) -> RlResult<Self> {
        let timeout = Duration::from_millis(config.api_timeout_ms);
        let inner = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| RlError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            refresh_path: config.refresh_path.clone(),
            timeout,
            store,
            refresh: Arc::new(Mutex::new(RefreshState::default())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Whether a token refresh is currently outstanding.
    pub async fn is_refreshing(&self) -> bool {
        self.refresh.lock().await.is_refreshing
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> RequestBuilder {
        let mut builder = self.inner.request(method, self.url(path)).timeout(self.timeout);
        if let Some(b) = body {
            builder = builder.json(b);
        }
        builder
    }

    /// Attach bearer and session headers. `token` overrides the stored
    /// access token (used for the replay after a refresh).
    fn authorize(
        builder: RequestBuilder,
        credential: Option<&Credential>,
        token: Option<&str>,
    ) -> RequestBuilder {
        let mut builder = builder;
        if let Some(token) = token.or(credential.map(|c| c.access_token.as_str())) {
            builder = builder.bearer_auth(token);
        }
        if let Some(credential) = credential {
            for (name, value) in credential.session_headers() {
                builder = builder.header(name, value);
            }
        }
        builder
    }

    async fn send_authorized(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> RlResult<Response> {
        let credential = self.store.get().await?;
        let builder = Self::authorize(
            self.build_request(method, path, body),
            credential.as_ref(),
            token,
        );
        builder.send().await.map_err(Self::classify_error)
    }

    /// Send an authenticated request.
    ///
    /// A 401 triggers one refresh-and-replay; a second 401 on the replay is
    /// returned as `RlError::AuthFailed`. Refresh failures surface as
    /// `RlError::TokenRefresh` and leave the credential store empty.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> RlResult<Response> {
        debug!("{} {}", method, path);
        let response = self.send_authorized(method.clone(), path, body, None).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_status(response).await;
        }

        debug!("{} {} returned 401, refreshing token", method, path);
        let token = self.refresh_or_wait().await?;

        let replay = self
            .send_authorized(method.clone(), path, body, Some(&token))
            .await?;
        if replay.status() == StatusCode::UNAUTHORIZED {
            warn!("{} {} still unauthorized after refresh", method, path);
            return Err(RlError::AuthFailed(format!(
                "{path} rejected the refreshed token"
            )));
        }
        Self::check_status(replay).await
    }

    /// Send a request without credentials and without refresh handling.
    pub async fn request_unauthenticated(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> RlResult<Response> {
        debug!("{} {} (unauthenticated)", method, path);
        let response = self
            .build_request(method, path, body)
            .send()
            .await
            .map_err(Self::classify_error)?;
        Self::check_status(response).await
    }

    // --- Token refresh ---

    /// Join the in-flight refresh or start one. Returns the new access token.
    async fn refresh_or_wait(&self) -> RlResult<String> {
        let waiter = {
            let mut state = self.refresh.lock().await;
            if state.is_refreshing {
                let (tx, rx) = oneshot::channel();
                state.queue.push(tx);
                Some(rx)
            } else {
                state.is_refreshing = true;
                None
            }
        };

        if let Some(rx) = waiter {
            debug!("refresh already in flight, request parked");
            return match rx.await {
                Ok(Ok(token)) => Ok(token),
                Ok(Err(message)) => Err(RlError::TokenRefresh(message)),
                Err(_) => Err(RlError::TokenRefresh("refresh was abandoned".into())),
            };
        }

        // Run the refresh on its own task so the queue is always drained,
        // even if this caller's future is dropped.
        let client = self.clone();
        tokio::spawn(async move { client.run_refresh().await })
            .await
            .map_err(|e| RlError::Internal(format!("refresh task failed: {e}")))?
    }

    async fn run_refresh(&self) -> RlResult<String> {
        let result = self.refresh_tokens().await;

        if let Err(e) = &result {
            warn!("token refresh failed: {e}");
            if let Err(clear_err) = self.store.clear().await {
                warn!("failed to clear credentials after refresh failure: {clear_err}");
            }
        }

        let queue = {
            let mut state = self.refresh.lock().await;
            state.is_refreshing = false;
            std::mem::take(&mut state.queue)
        };
        debug!("refresh settled, releasing {} parked request(s)", queue.len());

        match result {
            Ok(token) => {
                for tx in queue {
                    let _ = tx.send(Ok(token.clone()));
                }
                Ok(token)
            }
            Err(e) => {
                let message = match e {
                    RlError::TokenRefresh(message) => message,
                    other => other.to_string(),
                };
                for tx in queue {
                    let _ = tx.send(Err(message.clone()));
                }
                Err(RlError::TokenRefresh(message))
            }
        }
    }

    /// Exchange the stored refresh token and persist the new pair.
    async fn refresh_tokens(&self) -> RlResult<String> {
        let credential = self
            .store
            .get()
            .await?
            .ok_or_else(|| RlError::TokenRefresh("no refresh token stored".into()))?;

        let body = serde_json::json!({ "refreshToken": credential.refresh_token });
        let response = self
            .build_request(Method::POST, &self.refresh_path, Some(&body))
            .send()
            .await
            .map_err(|e| RlError::TokenRefresh(Self::classify_error(e).to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RlError::TokenRefresh(format!(
                "refresh endpoint returned {}: {}",
                status.as_u16(),
                response::error_message(&text)
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RlError::TokenRefresh(format!("unreadable refresh response: {e}")))?;
        let pair: TokenPair = response::unwrap_data(payload)
            .map_err(|e| RlError::TokenRefresh(e.to_string()))?;

        let refresh_token = pair
            .refresh_token
            .unwrap_or_else(|| credential.refresh_token.clone());
        let updated = credential.with_tokens(pair.access_token, refresh_token);
        updated
            .validate()
            .map_err(|e| RlError::TokenRefresh(e.to_string()))?;
        self.store.set(&updated).await?;

        info!("access token refreshed");
        Ok(updated.access_token)
    }

    // --- Public HTTP methods ---

    pub async fn get(&self, path: &str) -> RlResult<Response> {
        self.request(Method::GET, path, None).await
    }

    // --- Response helpers ---

    /// Deserialize a response body, accepting a `data` envelope.
    pub async fn parse_json<T: DeserializeOwned>(response: Response) -> RlResult<T> {
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RlError::Serialization(format!("failed to parse response: {e}")))?;
        response::unwrap_data(body)
    }

    /// Convenience: GET + parse.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> RlResult<T> {
        let resp = self.get(path).await?;
        Self::parse_json(resp).await
    }

    /// Check the HTTP status code and convert to RlError if needed.
    async fn check_status(response: Response) -> RlResult<Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(RlError::AuthFailed(format!(
                "server returned {status}: {}",
                response::error_message(&body)
            )));
        }

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(RlError::ServerError {
                status: status.as_u16(),
                message: response::error_message(&body),
            });
        }

        Ok(response)
    }

    /// Classify a reqwest error into an RlError variant.
    fn classify_error(e: reqwest::Error) -> RlError {
        if e.is_timeout() {
            RlError::Timeout(e.to_string())
        } else if e.is_connect() {
            RlError::Http(format!("connection failed: {e}"))
        } else {
            RlError::Http(e.to_string())
        }
    }
}
