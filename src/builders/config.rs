//! Configuration Builder
//!
//! Fluent builder for credentials configuration, plus environment loading.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{ConfigurationError, CredentialsError};
use crate::types::{
    CipherConfig, ClientCredentials, ClientType, CredentialsConfig, GoogleOAuthConfig,
    GraphQlConfig, ZoomOAuthConfig, DEFAULT_GOOGLE_TOKEN_URL, DEFAULT_GRAPHQL_ROLE,
    DEFAULT_SCHEDULER_URL, DEFAULT_TIMEOUT_MS, DEFAULT_ZOOM_BASE_TOKEN_URL,
};
use secrecy::SecretString;

/// Credentials configuration builder.
#[derive(Default)]
pub struct CredentialsConfigBuilder {
    graphql_endpoint: Option<String>,
    admin_secret: Option<SecretString>,
    graphql_role: Option<String>,
    google_token_url: Option<String>,
    google_clients: HashMap<ClientType, ClientCredentials>,
    zoom_base_token_url: Option<String>,
    zoom_credentials: Option<ClientCredentials>,
    cipher_passphrase: Option<SecretString>,
    cipher_salt: Option<String>,
    cipher_iv: Option<String>,
    scheduler_url: Option<String>,
    timeout: Option<Duration>,
}

impl CredentialsConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, CredentialsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut builder = Self::new();

        if let Some(endpoint) = get("POSTGRAPHILE_GRAPH_URL") {
            builder = builder.graphql_endpoint(endpoint);
        }
        if let Some(secret) = get("POSTGRAPHILE_ADMIN_SECRET") {
            builder = builder.admin_secret(secret);
        }
        if let Some(url) = get("GOOGLE_TOKEN_URL") {
            builder = builder.google_token_url(url);
        }

        for (client_type, id_key, secret_key) in [
            (
                ClientType::AtomicWeb,
                "GOOGLE_CLIENT_ID_ATOMIC_WEB",
                "GOOGLE_CLIENT_SECRET_ATOMIC_WEB",
            ),
            (ClientType::Web, "GOOGLE_CLIENT_ID_WEB", "GOOGLE_CLIENT_SECRET_WEB"),
        ] {
            if let (Some(id), Some(secret)) = (get(id_key), get(secret_key)) {
                builder = builder.google_client(client_type, id, secret);
            }
        }

        if let (Some(id), Some(secret)) = (get("ZOOM_CLIENT_ID"), get("ZOOM_CLIENT_SECRET")) {
            builder = builder.zoom_client(id, secret);
        }
        if let Some(url) = get("ZOOM_BASE_TOKEN_URL") {
            builder = builder.zoom_base_token_url(url);
        }

        if let Some(passphrase) = get("ZOOM_PASS_KEY") {
            builder.cipher_passphrase = Some(SecretString::new(passphrase));
        }
        builder.cipher_salt = get("ZOOM_SALT_FOR_PASS");
        builder.cipher_iv = get("ZOOM_IV_FOR_PASS");

        if let Some(url) = get("SCHEDULER_API_URL") {
            builder = builder.scheduler_url(url);
        }
        if let Some(raw) = get("API_REQUEST_TIMEOUT_MS") {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                ConfigurationError::InvalidValue {
                    field: "API_REQUEST_TIMEOUT_MS".to_string(),
                    message: format!("expected milliseconds, got {raw:?}"),
                }
            })?;
            builder = builder.timeout(Duration::from_millis(millis));
        }

        Ok(builder)
    }

    /// Set GraphQL endpoint.
    pub fn graphql_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.graphql_endpoint = Some(endpoint.into());
        self
    }

    /// Set GraphQL admin secret.
    pub fn admin_secret(mut self, secret: impl Into<String>) -> Self {
        self.admin_secret = Some(SecretString::new(secret.into()));
        self
    }

    /// Set GraphQL role header value.
    pub fn graphql_role(mut self, role: impl Into<String>) -> Self {
        self.graphql_role = Some(role.into());
        self
    }

    /// Set Google token endpoint.
    pub fn google_token_url(mut self, url: impl Into<String>) -> Self {
        self.google_token_url = Some(url.into());
        self
    }

    /// Register the Google OAuth client for a client type.
    pub fn google_client(
        mut self,
        client_type: ClientType,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.google_clients
            .insert(client_type, ClientCredentials::new(client_id, client_secret));
        self
    }

    /// Set Zoom OAuth client.
    pub fn zoom_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.zoom_credentials = Some(ClientCredentials::new(client_id, client_secret));
        self
    }

    /// Set Zoom OAuth base URL.
    pub fn zoom_base_token_url(mut self, url: impl Into<String>) -> Self {
        self.zoom_base_token_url = Some(url.into());
        self
    }

    /// Set token cipher key material. `salt` and `iv` are base64.
    pub fn cipher(
        mut self,
        passphrase: impl Into<String>,
        salt: impl Into<String>,
        iv: impl Into<String>,
    ) -> Self {
        self.cipher_passphrase = Some(SecretString::new(passphrase.into()));
        self.cipher_salt = Some(salt.into());
        self.cipher_iv = Some(iv.into());
        self
    }

    /// Set scheduler API base URL.
    pub fn scheduler_url(mut self, url: impl Into<String>) -> Self {
        self.scheduler_url = Some(url.into());
        self
    }

    /// Set per-attempt request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<CredentialsConfig, CredentialsError> {
        let endpoint = self.graphql_endpoint.ok_or_else(|| missing("graphql_endpoint"))?;
        validate_url(&endpoint)?;
        let admin_secret = self.admin_secret.ok_or_else(|| missing("admin_secret"))?;

        let google_token_url = self
            .google_token_url
            .unwrap_or_else(|| DEFAULT_GOOGLE_TOKEN_URL.to_string());
        validate_url(&google_token_url)?;

        let zoom = match self.zoom_credentials {
            Some(credentials) => {
                let base_token_url = self
                    .zoom_base_token_url
                    .unwrap_or_else(|| DEFAULT_ZOOM_BASE_TOKEN_URL.to_string());
                validate_url(&base_token_url)?;
                Some(ZoomOAuthConfig {
                    base_token_url,
                    credentials,
                })
            }
            None => None,
        };

        // Key material is all-or-nothing.
        let cipher = match (self.cipher_passphrase, self.cipher_salt, self.cipher_iv) {
            (None, None, None) => None,
            (Some(passphrase), Some(salt), Some(iv)) => Some(CipherConfig {
                passphrase,
                salt,
                iv,
            }),
            (passphrase, salt, _) => {
                let field = if passphrase.is_none() {
                    "cipher_passphrase"
                } else if salt.is_none() {
                    "cipher_salt"
                } else {
                    "cipher_iv"
                };
                return Err(missing(field));
            }
        };

        let scheduler_url = self
            .scheduler_url
            .unwrap_or_else(|| DEFAULT_SCHEDULER_URL.to_string());
        validate_url(&scheduler_url)?;

        let timeout = self
            .timeout
            .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS));
        if timeout.is_zero() {
            return Err(ConfigurationError::InvalidValue {
                field: "timeout".to_string(),
                message: "must be greater than zero".to_string(),
            }
            .into());
        }

        Ok(CredentialsConfig {
            graphql: GraphQlConfig {
                endpoint,
                admin_secret,
                role: self
                    .graphql_role
                    .unwrap_or_else(|| DEFAULT_GRAPHQL_ROLE.to_string()),
            },
            google: GoogleOAuthConfig {
                token_url: google_token_url,
                clients: self.google_clients,
            },
            zoom,
            cipher,
            scheduler_url,
            timeout,
        })
    }
}

fn missing(field: &str) -> CredentialsError {
    ConfigurationError::MissingRequired {
        field: field.to_string(),
    }
    .into()
}

fn validate_url(raw: &str) -> Result<(), CredentialsError> {
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigurationError::InvalidEndpoint {
            url: raw.to_string(),
        }
        .into()),
    }
}

/// Create a new credentials configuration builder.
pub fn credentials_config() -> CredentialsConfigBuilder {
    CredentialsConfigBuilder::new()
}
