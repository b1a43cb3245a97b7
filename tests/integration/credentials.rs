//! Credential lifecycle end to end: GraphQL store and Google token endpoint

use super::*;
use chrono::Duration;
use integrations_calendar_credentials::{
    credentials_config, ClientType, CredentialError, CredentialsClient, CredentialsError,
};
use secrecy::ExposeSecret;
use wiremock::matchers::{body_partial_json, body_string, header, method, path};
use wiremock::{Mock, ResponseTemplate};

const TOKEN_PATH: &str = "/token";

fn client(server: &MockServer) -> CredentialsClient {
    let config = credentials_config()
        .graphql_endpoint(format!("{}{}", server.uri(), GRAPHQL_PATH))
        .admin_secret(ADMIN_SECRET)
        .google_token_url(format!("{}{}", server.uri(), TOKEN_PATH))
        .google_client(ClientType::AtomicWeb, "google-id", "google-secret")
        .build()
        .expect("valid config");
    CredentialsClient::from_config(config).expect("client")
}

async fn mount_lookup(server: &MockServer, rows: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_partial_json(json!({"operationName": "getCalendarIntegration"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows_response(rows)))
        .mount(server)
        .await;
}

async fn mount_update(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_partial_json(json!({"operationName": "updateCalendarIntegration"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated_response("int-1")))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn update_bodies(server: &MockServer) -> Vec<Value> {
    received_json_bodies(server, GRAPHQL_PATH)
        .await
        .into_iter()
        .filter(|b| b["operationName"] == "updateCalendarIntegration")
        .collect()
}

#[tokio::test]
async fn test_valid_token_is_returned_without_refresh() {
    let mock_server = setup_mock_server().await;
    let expires_at = Utc::now() + Duration::hours(1);
    mount_lookup(
        &mock_server,
        vec![integration_row("int-1", Some("AT0"), Some("RT0"), Some(expires_at))],
    )
    .await;
    mount_update(&mock_server, 0).await;
    Mock::given(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let token = client(&mock_server)
        .google_access_token("user-1", "google_calendar", ClientType::AtomicWeb)
        .await
        .unwrap();

    assert_eq!(token.expose_secret(), "AT0");
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_persisted() {
    let mock_server = setup_mock_server().await;
    let expires_at = Utc::now() - Duration::minutes(5);
    mount_lookup(
        &mock_server,
        vec![integration_row("int-1", Some("AT0"), Some("RT0"), Some(expires_at))],
    )
    .await;
    mount_update(&mock_server, 1).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string(
            "grant_type=refresh_token&refresh_token=RT0&client_id=google-id&client_secret=google-secret",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "AT1",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/calendar",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let before = Utc::now();
    let token = client(&mock_server)
        .google_access_token("user-1", "google_calendar", ClientType::AtomicWeb)
        .await
        .unwrap();
    assert_eq!(token.expose_secret(), "AT1");

    let updates = update_bodies(&mock_server).await;
    assert_eq!(updates.len(), 1);
    let variables = &updates[0]["variables"];
    assert_eq!(variables["id"], "int-1");
    assert_eq!(variables["token"], "AT1");
    assert!(variables.get("refreshToken").is_none());
    assert!(variables.get("enabled").is_none());

    let persisted: DateTime<Utc> = variables["expiresAt"].as_str().unwrap().parse().unwrap();
    let lifetime = persisted - before;
    assert!(lifetime > Duration::seconds(3590) && lifetime <= Duration::seconds(3600));
}

#[tokio::test]
async fn test_refresh_rejection_disables_integration() {
    let mock_server = setup_mock_server().await;
    mount_lookup(
        &mock_server,
        vec![integration_row("int-1", None, Some("RT-revoked"), None)],
    )
    .await;
    mount_update(&mock_server, 1).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let error = client(&mock_server)
        .google_access_token("user-1", "google_calendar", ClientType::AtomicWeb)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        CredentialsError::Credential(CredentialError::RefreshFailed { .. })
    ));

    let updates = update_bodies(&mock_server).await;
    let variables = &updates[0]["variables"];
    assert!(variables["token"].is_null());
    assert!(variables["expiresAt"].is_null());
    assert_eq!(variables["enabled"], false);
}

#[tokio::test]
async fn test_missing_refresh_token_disables_integration() {
    let mock_server = setup_mock_server().await;
    mount_lookup(
        &mock_server,
        vec![integration_row("int-1", Some("AT0"), None, None)],
    )
    .await;
    mount_update(&mock_server, 1).await;

    let error = client(&mock_server)
        .google_access_token("user-1", "google_calendar", ClientType::AtomicWeb)
        .await
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "No refresh token provided from calendar integration."
    );
}

#[tokio::test]
async fn test_no_integration_touches_nothing() {
    let mock_server = setup_mock_server().await;
    mount_lookup(&mock_server, vec![]).await;
    mount_update(&mock_server, 0).await;

    let error = client(&mock_server)
        .google_access_token("user-1", "google_calendar", ClientType::AtomicWeb)
        .await
        .unwrap_err();

    assert_eq!(error.to_string(), "No calendar integration available.");
}
