//! GraphQL integration store wire format

use super::*;
use integrations_calendar_credentials::{
    CredentialsError, FieldUpdate, GraphQlIntegrationStore, IntegrationStore, ProtocolError,
    TokenUpdate,
};
use secrecy::ExposeSecret;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn store(server: &MockServer) -> GraphQlIntegrationStore {
    let (executor, _) = test_executor();
    GraphQlIntegrationStore::new(executor, graphql_config(server))
}

#[tokio::test]
async fn test_lookup_sends_admin_headers() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header("X-Postgraphile-Admin-Secret", ADMIN_SECRET))
        .and(header("X-Postgraphile-Role", "admin"))
        .and(body_partial_json(json!({
            "operationName": "getCalendarIntegration",
            "variables": {"userId": "user-1", "resource": "google_calendar"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows_response(vec![
            integration_row("int-1", Some("AT0"), Some("RT0"), None),
            integration_row("int-2", None, None, None),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let record = store(&mock_server)
        .get_by_resource("user-1", "google_calendar")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.id, "int-1");
    assert_eq!(record.token.unwrap().expose_secret(), "AT0");
    assert!(record.expires_at.is_none());
    assert!(record.updated_at.is_some());
}

#[tokio::test]
async fn test_lookup_absent_is_none() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows_response(vec![])))
        .mount(&mock_server)
        .await;

    let store = store(&mock_server);
    assert!(store
        .get_by_name("user-1", "Google Calendar")
        .await
        .unwrap()
        .is_none());
    assert!(store
        .list_by_resource_and_client_type("user-1", "google_calendar", "web")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_sparse_mutation_wire_body() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated_response("int-1")))
        .mount(&mock_server)
        .await;

    let update = TokenUpdate::new()
        .token(FieldUpdate::Set(SecretString::new("AT1".to_string())))
        .expires_in(FieldUpdate::Set(3600));
    store(&mock_server)
        .update_token("int-1", &update)
        .await
        .unwrap();

    let bodies = received_json_bodies(&mock_server, GRAPHQL_PATH).await;
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body["operationName"], "updateCalendarIntegration");

    let query = body["query"].as_str().unwrap();
    assert!(query.contains("$id: uuid!, $token: String, $expiresAt: timestamptz"));
    assert!(query.contains("_set: {token: $token, expiresAt: $expiresAt}"));
    assert!(!query.contains("refreshToken:"));
    assert!(!query.contains("enabled"));

    let variables = body["variables"].as_object().unwrap();
    assert_eq!(variables.len(), 3);
    assert_eq!(variables["id"], "int-1");
    assert_eq!(variables["token"], "AT1");
    assert!(variables["expiresAt"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_disable_mutation_sends_nulls() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated_response("int-1")))
        .mount(&mock_server)
        .await;

    store(&mock_server)
        .update_token("int-1", &TokenUpdate::disable())
        .await
        .unwrap();

    let bodies = received_json_bodies(&mock_server, GRAPHQL_PATH).await;
    let variables = &bodies[0]["variables"];
    assert!(variables["token"].is_null());
    assert!(variables["expiresAt"].is_null());
    assert_eq!(variables["enabled"], false);
}

#[tokio::test]
async fn test_graphql_errors_are_surfaced() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "field \"token\" not found"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let error = store(&mock_server)
        .list_by_resource("user-1", "google_calendar")
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        CredentialsError::Protocol(ProtocolError::GraphQl { .. })
    ));
}
