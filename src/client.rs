//! Credentials Client
//!
//! High-level client wiring the executor, store, refreshers, managers and
//! scheduler from one configuration.

use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

use crate::cipher::TokenCipher;
use crate::core::ReqwestHttpTransport;
use crate::error::{ConfigurationError, CredentialsResult};
use crate::resilience::{ResilientExecutor, RetryStats};
use crate::scheduler::SchedulerClient;
use crate::store::{GraphQlIntegrationStore, IntegrationStore};
use crate::token::{
    CredentialLifecycleManager, GoogleTokenRefresher, TokenManager, TokenRefresher,
    ZoomTokenRefresher,
};
use crate::types::{ClientType, CredentialsConfig};

/// Resource name of Zoom integrations.
pub const ZOOM_RESOURCE: &str = "zoom";

/// Client for integration credentials and the scheduler API.
pub struct CredentialsClient<
    S: IntegrationStore = GraphQlIntegrationStore,
    G: TokenRefresher = GoogleTokenRefresher,
    Z: TokenRefresher = ZoomTokenRefresher,
> {
    executor: Arc<ResilientExecutor>,
    store: Arc<S>,
    google: CredentialLifecycleManager<S, G>,
    zoom: Option<CredentialLifecycleManager<S, Z>>,
    cipher: Option<TokenCipher>,
    scheduler: SchedulerClient,
}

impl CredentialsClient {
    /// Create a client with the default GraphQL store and provider refreshers.
    pub fn from_config(config: CredentialsConfig) -> CredentialsResult<Self> {
        let transport = Arc::new(ReqwestHttpTransport::with_timeout(config.timeout)?);
        let executor =
            Arc::new(ResilientExecutor::new(transport).with_default_timeout(config.timeout));

        let store = GraphQlIntegrationStore::new(executor.clone(), config.graphql);
        let google = GoogleTokenRefresher::new(executor.clone(), config.google);
        let zoom = config
            .zoom
            .map(|zoom| ZoomTokenRefresher::new(executor.clone(), zoom));
        let cipher = config
            .cipher
            .map(|c| TokenCipher::new(&c.passphrase, &c.salt, &c.iv))
            .transpose()?;

        info!(
            zoom = zoom.is_some(),
            cipher = cipher.is_some(),
            scheduler_url = %config.scheduler_url,
            "Credentials client configured"
        );

        Ok(Self::with_components(
            executor,
            store,
            google,
            zoom,
            cipher,
            config.scheduler_url,
        ))
    }
}

impl<S: IntegrationStore, G: TokenRefresher, Z: TokenRefresher> CredentialsClient<S, G, Z> {
    /// Create a client with custom implementations.
    ///
    /// `cipher` applies to Zoom integrations only; Google tokens are stored
    /// in plaintext.
    pub fn with_components(
        executor: Arc<ResilientExecutor>,
        store: S,
        google_refresher: G,
        zoom_refresher: Option<Z>,
        cipher: Option<TokenCipher>,
        scheduler_url: impl Into<String>,
    ) -> Self {
        let store = Arc::new(store);
        let google = CredentialLifecycleManager::new(store.clone(), Arc::new(google_refresher));
        let zoom = zoom_refresher.map(|refresher| {
            let manager = CredentialLifecycleManager::new(store.clone(), Arc::new(refresher));
            match &cipher {
                Some(cipher) => manager.with_cipher(cipher.clone()),
                None => manager,
            }
        });
        let scheduler = SchedulerClient::new(executor.clone(), scheduler_url);

        Self {
            executor,
            store,
            google,
            zoom,
            cipher,
            scheduler,
        }
    }

    /// Valid Google access token for the user's `resource` integration.
    pub async fn google_access_token(
        &self,
        user_id: &str,
        resource: &str,
        client_type: ClientType,
    ) -> CredentialsResult<SecretString> {
        self.google
            .get_access_token(user_id, resource, client_type)
            .await
    }

    /// Valid Zoom access token for the user.
    pub async fn zoom_access_token(&self, user_id: &str) -> CredentialsResult<SecretString> {
        let zoom = self
            .zoom
            .as_ref()
            .ok_or_else(|| ConfigurationError::MissingRequired {
                field: "zoom".to_string(),
            })?;
        zoom.get_access_token(user_id, ZOOM_RESOURCE, ClientType::Web)
            .await
    }

    /// Integration record store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Scheduler API client.
    pub fn scheduler(&self) -> &SchedulerClient {
        &self.scheduler
    }

    /// Token cipher, when key material was configured.
    pub fn cipher(&self) -> Option<&TokenCipher> {
        self.cipher.as_ref()
    }

    /// Retry statistics across every outbound call.
    pub fn executor_stats(&self) -> RetryStats {
        self.executor.get_stats()
    }
}
