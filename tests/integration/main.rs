//! Integration tests using WireMock
//!
//! These tests drive the real reqwest transport against a mock HTTP server:
//! retry behavior, GraphQL wire bodies, provider refresh requests, the full
//! credential lifecycle and scheduler error mapping.

mod credentials;
mod executor;
mod scheduler;
mod store;

use chrono::{DateTime, SecondsFormat, Utc};
use integrations_calendar_credentials::{
    GraphQlConfig, MockSleeper, ReqwestHttpTransport, ResilientExecutor,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::MockServer;

pub const GRAPHQL_PATH: &str = "/v1/graphql";
pub const ADMIN_SECRET: &str = "test-admin-secret";

/// Helper to create a mock server
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Executor over the real transport with recorded, instant backoff sleeps.
pub fn test_executor() -> (Arc<ResilientExecutor>, Arc<MockSleeper>) {
    let transport = ReqwestHttpTransport::new().expect("Failed to build transport");
    let sleeper = Arc::new(MockSleeper::new());
    let executor = ResilientExecutor::new(Arc::new(transport)).with_sleeper(sleeper.clone());
    (Arc::new(executor), sleeper)
}

pub fn graphql_config(server: &MockServer) -> GraphQlConfig {
    GraphQlConfig {
        endpoint: format!("{}{}", server.uri(), GRAPHQL_PATH),
        admin_secret: SecretString::new(ADMIN_SECRET.to_string()),
        role: "admin".to_string(),
    }
}

/// `Calendar_Integration` row as the GraphQL backend returns it.
pub fn integration_row(
    id: &str,
    token: Option<&str>,
    refresh_token: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) -> Value {
    json!({
        "id": id,
        "userId": "user-1",
        "resource": "google_calendar",
        "name": "Google Calendar",
        "clientType": "atomic-web",
        "token": token,
        "refreshToken": refresh_token,
        "expiresAt": expires_at.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)),
        "enabled": true,
        "syncEnabled": true,
        "updatedAt": "2024-05-01T10:00:00.000Z"
    })
}

pub fn rows_response(rows: Vec<Value>) -> Value {
    json!({ "data": { "Calendar_Integration": rows } })
}

pub fn updated_response(id: &str) -> Value {
    json!({ "data": { "update_Calendar_Integration_by_pk": { "id": id } } })
}

/// Parsed JSON bodies of every request received on `path`.
pub async fn received_json_bodies(server: &MockServer, path: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == path)
        .map(|r| serde_json::from_slice(&r.body).expect("request body is JSON"))
        .collect()
}
