//! Sparse Mutations
//!
//! Typed partial updates of an integration record and the GraphQL documents
//! built from them. A field that is [`FieldUpdate::Unchanged`] appears neither
//! in the variable declarations, the `_set` clause nor the variables.

use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::error::ProtocolError;
use crate::types::expiry_after;

/// Update of a single nullable column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    /// Leave the column untouched.
    Unchanged,
    /// Set the column to `null`.
    Clear,
    Set(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        Self::Unchanged
    }
}

impl<T> FieldUpdate<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    fn map<U>(&self, f: impl FnOnce(&T) -> U) -> FieldUpdate<U> {
        match self {
            Self::Unchanged => FieldUpdate::Unchanged,
            Self::Clear => FieldUpdate::Clear,
            Self::Set(value) => FieldUpdate::Set(f(value)),
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    /// `None` clears the column.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Set(value),
            None => Self::Clear,
        }
    }
}

/// Partial update of the credential columns of an integration.
#[derive(Clone, Default)]
pub struct TokenUpdate {
    pub token: FieldUpdate<SecretString>,
    pub refresh_token: FieldUpdate<SecretString>,
    /// Seconds from now; stored as the absolute `expiresAt`.
    pub expires_in: FieldUpdate<i64>,
    pub enabled: Option<bool>,
}

impl TokenUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// New access token after a successful refresh.
    pub fn refreshed(token: SecretString, expires_in: Option<i64>) -> Self {
        Self {
            token: FieldUpdate::Set(token),
            expires_in: expires_in.map(FieldUpdate::Set).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Clear the token and expiry and disable the integration.
    pub fn disable() -> Self {
        Self {
            token: FieldUpdate::Clear,
            expires_in: FieldUpdate::Clear,
            enabled: Some(false),
            ..Self::default()
        }
    }

    pub fn token(mut self, token: FieldUpdate<SecretString>) -> Self {
        self.token = token;
        self
    }

    pub fn refresh_token(mut self, refresh_token: FieldUpdate<SecretString>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    pub fn expires_in(mut self, expires_in: FieldUpdate<i64>) -> Self {
        self.expires_in = expires_in;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Nothing would be written.
    pub fn is_empty(&self) -> bool {
        self.token.is_unchanged()
            && self.refresh_token.is_unchanged()
            && self.expires_in.is_unchanged()
            && self.enabled.is_none()
    }
}

impl fmt::Debug for TokenUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenUpdate")
            .field("token", &self.token.map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// GraphQL request body.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    pub operation_name: String,
    pub query: String,
    pub variables: Map<String, Value>,
}

/// Operation name of the token update mutation.
pub const UPDATE_OPERATION: &str = "updateCalendarIntegration";

/// One column of the sparse mutation.
struct Column {
    variable: &'static str,
    graphql_type: &'static str,
    value: Value,
}

/// Builds the `update_Calendar_Integration_by_pk` mutation for `update`.
///
/// Fails when `expires_in` cannot be turned into a timestamp.
pub fn build_update_token_mutation(
    id: &str,
    update: &TokenUpdate,
    now: DateTime<Utc>,
) -> Result<GraphQlRequest, ProtocolError> {
    let mut columns = Vec::new();

    if let Some(value) = secret_value(&update.token) {
        columns.push(Column {
            variable: "token",
            graphql_type: "String",
            value,
        });
    }
    if let Some(value) = secret_value(&update.refresh_token) {
        columns.push(Column {
            variable: "refreshToken",
            graphql_type: "String",
            value,
        });
    }
    match update.expires_in {
        FieldUpdate::Unchanged => {}
        FieldUpdate::Clear => columns.push(Column {
            variable: "expiresAt",
            graphql_type: "timestamptz",
            value: Value::Null,
        }),
        FieldUpdate::Set(secs) => {
            let expires_at = expiry_after(now, secs)?;
            columns.push(Column {
                variable: "expiresAt",
                graphql_type: "timestamptz",
                value: Value::String(expires_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            });
        }
    }
    if let Some(enabled) = update.enabled {
        columns.push(Column {
            variable: "enabled",
            graphql_type: "Boolean",
            value: Value::Bool(enabled),
        });
    }

    let mut declarations = vec!["$id: uuid!".to_string()];
    let mut set_clauses = Vec::new();
    let mut variables = Map::new();
    variables.insert("id".to_string(), Value::String(id.to_string()));

    for column in columns {
        declarations.push(format!("${}: {}", column.variable, column.graphql_type));
        set_clauses.push(format!("{0}: ${0}", column.variable));
        variables.insert(column.variable.to_string(), column.value);
    }

    let query = format!(
        "mutation {UPDATE_OPERATION}({}) {{\n  update_Calendar_Integration_by_pk(pk_columns: {{id: $id}}, _set: {{{}}}) {{\n    id\n    name\n    refreshToken\n    token\n    clientType\n    userId\n    updatedAt\n  }}\n}}",
        declarations.join(", "),
        set_clauses.join(", "),
    );

    Ok(GraphQlRequest {
        operation_name: UPDATE_OPERATION.to_string(),
        query,
        variables,
    })
}

fn secret_value(update: &FieldUpdate<SecretString>) -> Option<Value> {
    match update {
        FieldUpdate::Unchanged => None,
        FieldUpdate::Clear => Some(Value::Null),
        FieldUpdate::Set(secret) => Some(Value::String(secret.expose_secret().clone())),
    }
}
