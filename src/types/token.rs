//! Token Types
//!
//! Provider refresh responses.

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;

use super::integration::deserialize_secret;
use crate::error::ProtocolError;

/// Absolute expiry `expires_in` seconds after `now`.
///
/// Fails when the lifetime does not fit the supported date range.
pub fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, ProtocolError> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or(ProtocolError::InvalidExpiry { expires_in })
}

/// Response of a provider token endpoint to a `refresh_token` grant.
///
/// `access_token` is optional on purpose: a 2xx response without it is a
/// refresh failure, not a parse failure.
#[derive(Clone, Deserialize)]
pub struct RefreshResponse {
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub access_token: Option<SecretString>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Rotated refresh token, if the provider issued one.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub refresh_token: Option<SecretString>,
}

impl fmt::Debug for RefreshResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshResponse")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}
