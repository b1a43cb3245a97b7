//! Resilient executor over the real transport

use super::*;
use integrations_calendar_credentials::{
    CallOptions, CredentialsError, HttpMethod, NetworkErrorCode,
};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_retry_on_503_then_success() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/resource"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/resource"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let (executor, sleeper) = test_executor();
    let body: Value = executor
        .execute(
            HttpMethod::Get,
            &format!("{}/resource", mock_server.uri()),
            CallOptions::new(),
            "getResource",
        )
        .await
        .unwrap();

    assert_eq!(body["ok"], true);
    assert_eq!(sleeper.get_delays(), vec![Duration::from_millis(1000)]);
    let stats = executor.get_stats();
    assert_eq!(stats.total_attempts, 2);
    assert_eq!(stats.successful_retries, 1);
}

#[tokio::test]
async fn test_no_retry_on_client_error() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/resource"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (executor, sleeper) = test_executor();
    let error = executor
        .execute::<Value>(
            HttpMethod::Post,
            &format!("{}/resource", mock_server.uri()),
            CallOptions::new().json(json!({"a": 1})),
            "postResource",
        )
        .await
        .unwrap_err();

    assert_eq!(error.status_code(), Some(404));
    assert!(!error.is_retryable());
    assert!(sleeper.get_delays().is_empty());
}

#[tokio::test]
async fn test_exhausts_three_attempts() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/resource"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let (executor, sleeper) = test_executor();
    let report = executor
        .dispatch(
            HttpMethod::Get,
            &format!("{}/resource", mock_server.uri()),
            CallOptions::new(),
            "getResource",
        )
        .await;

    assert_eq!(report.attempts.len(), 3);
    assert!(matches!(report.result, Err(CredentialsError::Http(ref e)) if e.status == 500));
    assert_eq!(
        sleeper.get_delays(),
        vec![Duration::from_millis(1000), Duration::from_millis(2000)]
    );
    assert_eq!(executor.get_stats().failed_operations, 1);
}

#[tokio::test]
async fn test_per_attempt_timeout_is_retried() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let (executor, sleeper) = test_executor();
    let error = executor
        .execute_text(
            HttpMethod::Get,
            &format!("{}/slow", mock_server.uri()),
            CallOptions::new().timeout(Duration::from_millis(50)),
            "getSlow",
        )
        .await
        .unwrap_err();

    assert_eq!(error.network_code(), Some(&NetworkErrorCode::TimedOut));
    assert_eq!(sleeper.get_delays().len(), 2);
}

#[tokio::test]
async fn test_connection_refused_is_retried() {
    // Bind a port, then release it.
    let uri = {
        let server = setup_mock_server().await;
        server.uri()
    };

    let (executor, sleeper) = test_executor();
    let error = executor
        .execute_text(
            HttpMethod::Get,
            &format!("{uri}/resource"),
            CallOptions::new(),
            "getResource",
        )
        .await
        .unwrap_err();

    assert!(error.is_retryable());
    assert_eq!(error.network_code(), Some(&NetworkErrorCode::ConnectionRefused));
    assert_eq!(sleeper.get_delays().len(), 2);
}
