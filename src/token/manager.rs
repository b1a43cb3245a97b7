//! Credential Lifecycle Manager
//!
//! Produces a currently valid access token for a user integration, refreshing
//! and persisting it when needed, and disables the integration when no token
//! can be produced.
//!
//! There is no locking around get-or-refresh: two concurrent calls for the same
//! integration may both refresh, and the last update wins.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::cipher::TokenCipher;
use crate::error::{CredentialError, CredentialsResult};
use crate::store::{FieldUpdate, IntegrationStore, TokenUpdate};
use crate::token::TokenRefresher;
use crate::types::{expiry_after, ClientType, IntegrationRecord, RefreshResponse};

/// Token manager interface.
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Get a valid access token, refreshing if necessary.
    async fn get_access_token(
        &self,
        user_id: &str,
        resource: &str,
        client_type: ClientType,
    ) -> CredentialsResult<SecretString>;
}

/// Plaintext credentials of a looked-up record.
struct StoredCredentials {
    token: Option<SecretString>,
    refresh_token: Option<SecretString>,
}

/// Credential lifecycle manager over a store and a provider refresher.
pub struct CredentialLifecycleManager<S: IntegrationStore, R: TokenRefresher> {
    store: Arc<S>,
    refresher: Arc<R>,
    cipher: Option<TokenCipher>,
}

impl<S: IntegrationStore, R: TokenRefresher> CredentialLifecycleManager<S, R> {
    /// Create new manager for plaintext-stored tokens.
    pub fn new(store: Arc<S>, refresher: Arc<R>) -> Self {
        Self {
            store,
            refresher,
            cipher: None,
        }
    }

    /// Tokens are stored encrypted with `cipher`.
    pub fn with_cipher(mut self, cipher: TokenCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    async fn resolve(
        &self,
        user_id: &str,
        resource: &str,
        client_type: ClientType,
        integration_id: &mut Option<String>,
    ) -> CredentialsResult<SecretString> {
        let record = self
            .store
            .get_by_resource(user_id, resource)
            .await?
            .ok_or(CredentialError::NoIntegration)?;
        *integration_id = Some(record.id.clone());

        let stored = self.read_credentials(&record)?;
        let refresh_token = stored
            .refresh_token
            .ok_or(CredentialError::NoRefreshToken)?;

        let now = Utc::now();
        match stored.token {
            Some(token) if !record.is_expired_at(now) => {
                debug!(integration_id = %record.id, "Using stored access token");
                return Ok(token);
            }
            Some(_) => info!(
                integration_id = %record.id,
                expires_at = ?record.expires_at,
                "Access token expired, refreshing"
            ),
            None => info!(integration_id = %record.id, "No access token stored, refreshing"),
        }

        let response = self
            .refresher
            .refresh(&refresh_token, client_type)
            .await
            .map_err(|e| CredentialError::RefreshFailed {
                source: Box::new(e),
            })?;

        let access_token = response
            .access_token
            .clone()
            .ok_or(CredentialError::MissingAccessToken)?;

        let update = self.refreshed_update(&access_token, &response)?;
        self.store.update_token(&record.id, &update).await?;
        info!(
            integration_id = %record.id,
            expires_in = ?response.expires_in,
            "Access token refreshed"
        );

        Ok(access_token)
    }

    fn read_credentials(&self, record: &IntegrationRecord) -> CredentialsResult<StoredCredentials> {
        let Some(cipher) = &self.cipher else {
            return Ok(StoredCredentials {
                token: record.token.clone(),
                refresh_token: record.refresh_token.clone(),
            });
        };

        let decrypt = |value: &Option<SecretString>| -> CredentialsResult<Option<SecretString>> {
            match value {
                Some(v) if !v.expose_secret().is_empty() => Ok(Some(SecretString::new(
                    cipher.decrypt_value(v.expose_secret())?,
                ))),
                _ => Ok(None),
            }
        };

        Ok(StoredCredentials {
            token: decrypt(&record.token)?,
            refresh_token: decrypt(&record.refresh_token)?,
        })
    }

    fn refreshed_update(
        &self,
        access_token: &SecretString,
        response: &RefreshResponse,
    ) -> CredentialsResult<TokenUpdate> {
        if let Some(expires_in) = response.expires_in {
            expiry_after(Utc::now(), expires_in)?;
        }

        let update = match &self.cipher {
            Some(cipher) => {
                let encrypted = cipher.encrypt(
                    access_token.expose_secret(),
                    response.refresh_token.as_ref().map(|t| t.expose_secret().as_str()),
                )?;
                let mut update = TokenUpdate::refreshed(
                    SecretString::new(encrypted.encrypted_token),
                    response.expires_in,
                );
                if let Some(refresh) = encrypted.encrypted_refresh_token {
                    update.refresh_token = FieldUpdate::Set(SecretString::new(refresh));
                }
                update
            }
            None => {
                let mut update = TokenUpdate::refreshed(access_token.clone(), response.expires_in);
                if let Some(refresh) = &response.refresh_token {
                    update.refresh_token = FieldUpdate::Set(refresh.clone());
                }
                update
            }
        };

        Ok(update)
    }

    /// Best-effort disable. Failures are logged and dropped.
    async fn disable(&self, integration_id: &str) {
        warn!(integration_id, "Disabling integration");
        if let Err(e) = self
            .store
            .update_token(integration_id, &TokenUpdate::disable())
            .await
        {
            error!(
                integration_id,
                error = %e,
                "Unable to disable integration"
            );
        }
    }
}

#[async_trait]
impl<S: IntegrationStore, R: TokenRefresher> TokenManager for CredentialLifecycleManager<S, R> {
    async fn get_access_token(
        &self,
        user_id: &str,
        resource: &str,
        client_type: ClientType,
    ) -> CredentialsResult<SecretString> {
        let mut integration_id = None;
        let result = self
            .resolve(user_id, resource, client_type, &mut integration_id)
            .await;

        if let Err(e) = &result {
            error!(
                user_id,
                resource,
                client_type = %client_type,
                error = %e,
                "Unable to get access token"
            );
            if let Some(id) = &integration_id {
                self.disable(id).await;
            }
        }
        result
    }
}
