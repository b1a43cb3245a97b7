//! Integration Types
//!
//! Stored per-user integration records and OAuth client types.

use chrono::{DateTime, NaiveDateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigurationError, CredentialsError};

/// Stored connection of a user to a third-party service.
///
/// Owned by the external datastore. Only `token`, `refresh_token`,
/// `expires_at` and `enabled` are ever mutated by this crate.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationRecord {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub client_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub token: Option<SecretString>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub refresh_token: Option<SecretString>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub sync_enabled: Option<bool>,
    #[serde(default)]
    pub deleted: Option<bool>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_email: Option<String>,
    #[serde(default)]
    pub app_account_id: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_date: Option<DateTime<Utc>>,
}

impl IntegrationRecord {
    /// Minimal record, mostly useful in tests.
    pub fn new(id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            resource: None,
            name: None,
            client_type: None,
            token: None,
            refresh_token: None,
            expires_at: None,
            enabled: None,
            sync_enabled: None,
            deleted: None,
            app_id: None,
            app_email: None,
            app_account_id: None,
            contact_email: None,
            contact_name: None,
            updated_at: None,
            created_date: None,
        }
    }

    /// Whether the stored token has passed its expiry.
    ///
    /// A record without `expires_at` is never considered expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now > at).unwrap_or(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }
}

impl fmt::Debug for IntegrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationRecord")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("resource", &self.resource)
            .field("name", &self.name)
            .field("client_type", &self.client_type)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("enabled", &self.enabled)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// OAuth client type the integration was authorized with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientType {
    #[serde(rename = "ios")]
    Ios,
    #[serde(rename = "android")]
    Android,
    #[serde(rename = "web")]
    Web,
    #[serde(rename = "atomic-web")]
    AtomicWeb,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Web => "web",
            Self::AtomicWeb => "atomic-web",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientType {
    type Err = CredentialsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            "web" => Ok(Self::Web),
            "atomic-web" => Ok(Self::AtomicWeb),
            other => Err(ConfigurationError::UnsupportedClientType {
                client_type: other.to_string(),
            }
            .into()),
        }
    }
}

pub(crate) fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(SecretString::new))
}

/// Accepts RFC 3339 and zone-less timestamps, the latter taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<String>::deserialize(deserializer)? {
        Some(value) => value,
        None => return Ok(None),
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&value) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}
