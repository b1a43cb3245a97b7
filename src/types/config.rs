//! Configuration Types
//!
//! Process-wide configuration, read once at startup.

use secrecy::SecretString;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use super::integration::ClientType;

/// Default Google OAuth token endpoint.
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Default Zoom OAuth base URL.
pub const DEFAULT_ZOOM_BASE_TOKEN_URL: &str = "https://zoom.us";
/// Default scheduler API base URL.
pub const DEFAULT_SCHEDULER_URL: &str = "http://localhost:8080";
/// Default role sent with every GraphQL request.
pub const DEFAULT_GRAPHQL_ROLE: &str = "admin";
/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 15000;

/// Top-level configuration.
#[derive(Clone, Debug)]
pub struct CredentialsConfig {
    pub graphql: GraphQlConfig,
    pub google: GoogleOAuthConfig,
    pub zoom: Option<ZoomOAuthConfig>,
    /// Key material for encrypted-at-rest tokens.
    pub cipher: Option<CipherConfig>,
    pub scheduler_url: String,
    /// Per-attempt timeout for every outbound call.
    pub timeout: Duration,
}

/// GraphQL backend connection.
#[derive(Clone)]
pub struct GraphQlConfig {
    pub endpoint: String,
    pub admin_secret: SecretString,
    pub role: String,
}

impl fmt::Debug for GraphQlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphQlConfig")
            .field("endpoint", &self.endpoint)
            .field("admin_secret", &"[REDACTED]")
            .field("role", &self.role)
            .finish()
    }
}

/// OAuth client id and secret.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Google token endpoint and the OAuth clients per client type.
#[derive(Clone, Debug)]
pub struct GoogleOAuthConfig {
    pub token_url: String,
    pub clients: HashMap<ClientType, ClientCredentials>,
}

impl Default for GoogleOAuthConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_GOOGLE_TOKEN_URL.to_string(),
            clients: HashMap::new(),
        }
    }
}

/// Zoom OAuth client.
#[derive(Clone, Debug)]
pub struct ZoomOAuthConfig {
    /// Base URL; the token endpoint is `{base}/oauth/token`.
    pub base_token_url: String,
    pub credentials: ClientCredentials,
}

impl ZoomOAuthConfig {
    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.base_token_url.trim_end_matches('/'))
    }
}

/// Token cipher key material. `salt` and `iv` are base64.
#[derive(Clone)]
pub struct CipherConfig {
    pub passphrase: SecretString,
    pub salt: String,
    pub iv: String,
}

impl fmt::Debug for CipherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherConfig")
            .field("passphrase", &"[REDACTED]")
            .field("salt", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_token_url() {
        let zoom = ZoomOAuthConfig {
            base_token_url: "https://zoom.us/".to_string(),
            credentials: ClientCredentials::new("id", "secret"),
        };
        assert_eq!(zoom.token_url(), "https://zoom.us/oauth/token");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credentials = ClientCredentials::new("id", "very-secret");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("id"));
        assert!(!debug.contains("very-secret"));
    }
}
