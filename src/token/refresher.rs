//! Token Refreshers
//!
//! Provider token endpoint calls for the `refresh_token` grant.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::core::{lock, HttpMethod};
use crate::error::{ConfigurationError, CredentialsResult, NetworkError, NetworkErrorCode};
use crate::resilience::{CallOptions, ResilientExecutor};
use crate::types::{ClientType, GoogleOAuthConfig, RefreshResponse, ZoomOAuthConfig};

/// Provider token refresher interface.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange a refresh token for a new access token.
    ///
    /// A 2xx response without `access_token` is returned as-is; deciding
    /// that it is a failure is up to the caller.
    async fn refresh(
        &self,
        refresh_token: &SecretString,
        client_type: ClientType,
    ) -> CredentialsResult<RefreshResponse>;
}

/// Google OAuth refresher. Client credentials travel in the form body.
pub struct GoogleTokenRefresher {
    executor: Arc<ResilientExecutor>,
    config: GoogleOAuthConfig,
}

impl GoogleTokenRefresher {
    pub fn new(executor: Arc<ResilientExecutor>, config: GoogleOAuthConfig) -> Self {
        Self { executor, config }
    }
}

#[async_trait]
impl TokenRefresher for GoogleTokenRefresher {
    async fn refresh(
        &self,
        refresh_token: &SecretString,
        client_type: ClientType,
    ) -> CredentialsResult<RefreshResponse> {
        let credentials = self.config.clients.get(&client_type).ok_or_else(|| {
            ConfigurationError::UnsupportedClientType {
                client_type: client_type.to_string(),
            }
        })?;
        debug!(client_type = %client_type, "Refreshing Google access token");

        let options = CallOptions::new().form([
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret().as_str()),
            ("client_id", credentials.client_id.as_str()),
            (
                "client_secret",
                credentials.client_secret.expose_secret().as_str(),
            ),
        ]);

        self.executor
            .execute(
                HttpMethod::Post,
                &self.config.token_url,
                options,
                "refreshGoogleToken",
            )
            .await
    }
}

/// Zoom OAuth refresher. Client credentials travel as HTTP Basic auth.
///
/// Zoom rotates refresh tokens, so responses normally carry a new one.
pub struct ZoomTokenRefresher {
    executor: Arc<ResilientExecutor>,
    config: ZoomOAuthConfig,
}

impl ZoomTokenRefresher {
    pub fn new(executor: Arc<ResilientExecutor>, config: ZoomOAuthConfig) -> Self {
        Self { executor, config }
    }
}

#[async_trait]
impl TokenRefresher for ZoomTokenRefresher {
    async fn refresh(
        &self,
        refresh_token: &SecretString,
        _client_type: ClientType,
    ) -> CredentialsResult<RefreshResponse> {
        debug!("Refreshing Zoom access token");

        let options = CallOptions::new()
            .form([
                ("refresh_token", refresh_token.expose_secret().as_str()),
                ("grant_type", "refresh_token"),
            ])
            .basic_auth(
                &self.config.credentials.client_id,
                self.config.credentials.client_secret.expose_secret(),
            );

        self.executor
            .execute(
                HttpMethod::Post,
                &self.config.token_url(),
                options,
                "refreshZoomToken",
            )
            .await
    }
}

/// Mock refresher for testing.
#[derive(Default)]
pub struct MockTokenRefresher {
    responses: Mutex<VecDeque<CredentialsResult<RefreshResponse>>>,
    calls: Mutex<Vec<(String, ClientType)>>,
}

impl MockTokenRefresher {
    /// Create new mock refresher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a refresh response.
    pub fn queue_response(&self, response: RefreshResponse) -> &Self {
        lock(&self.responses).push_back(Ok(response));
        self
    }

    /// Queue a successful refresh with the given access token and lifetime.
    pub fn queue_token(&self, access_token: &str, expires_in: i64) -> &Self {
        self.queue_response(RefreshResponse {
            access_token: Some(SecretString::new(access_token.to_string())),
            expires_in: Some(expires_in),
            scope: None,
            token_type: Some("Bearer".to_string()),
            refresh_token: None,
        })
    }

    /// Queue a network failure.
    pub fn queue_network_error(&self, code: NetworkErrorCode) -> &Self {
        lock(&self.responses)
            .push_back(Err(NetworkError::new(Some(code), "mock refresh failure").into()));
        self
    }

    /// Refresh tokens and client types received, in order.
    pub fn get_calls(&self) -> Vec<(String, ClientType)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl TokenRefresher for MockTokenRefresher {
    async fn refresh(
        &self,
        refresh_token: &SecretString,
        client_type: ClientType,
    ) -> CredentialsResult<RefreshResponse> {
        lock(&self.calls).push((refresh_token.expose_secret().clone(), client_type));
        lock(&self.responses).pop_front().unwrap_or_else(|| {
            Err(NetworkError::new(None, "No mock refresh response available").into())
        })
    }
}

/// Create mock refresher for testing.
pub fn create_mock_refresher() -> MockTokenRefresher {
    MockTokenRefresher::new()
}
