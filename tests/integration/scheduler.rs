//! Scheduler API client

use super::*;
use integrations_calendar_credentials::{
    CredentialsError, ScheduleMeetingRequest, SchedulerClient,
};
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

const SCHEDULE_PATH: &str = "/timeTable/user/scheduleMeeting";

fn request() -> ScheduleMeetingRequest {
    ScheduleMeetingRequest {
        participant_names: vec!["Ada".to_string()],
        duration_minutes: 45,
        preferred_date: "2024-06-03".to_string(),
        preferred_start_time_from: "13:00".to_string(),
        preferred_start_time_to: "17:00".to_string(),
    }
}

#[tokio::test]
async fn test_schedule_meeting_success() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(SCHEDULE_PATH))
        .and(body_json(json!({
            "participantNames": ["Ada"],
            "durationMinutes": 45,
            "preferredDate": "2024-06-03",
            "preferredStartTimeFrom": "13:00",
            "preferredStartTimeTo": "17:00"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "scheduled"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (executor, _) = test_executor();
    let scheduler = SchedulerClient::new(executor, mock_server.uri());

    let response = scheduler.schedule_meeting(&request()).await.unwrap();
    assert_eq!(response["status"], "scheduled");
}

#[tokio::test]
async fn test_schedule_meeting_json_error() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(SCHEDULE_PATH))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "participant unknown"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let (executor, _) = test_executor();
    let error = SchedulerClient::new(executor, mock_server.uri())
        .schedule_meeting(&request())
        .await
        .unwrap_err();

    assert!(matches!(error, CredentialsError::Api(_)));
    assert_eq!(
        error.to_string(),
        "API Error from scheduleMeeting: participant unknown"
    );
}

#[tokio::test]
async fn test_schedule_meeting_text_error_after_retries() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(SCHEDULE_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let (executor, sleeper) = test_executor();
    let error = SchedulerClient::new(executor, mock_server.uri())
        .schedule_meeting(&request())
        .await
        .unwrap_err();

    assert_eq!(error.to_string(), "API Error from scheduleMeeting: Bad Gateway");
    assert_eq!(
        sleeper.get_delays(),
        vec![Duration::from_millis(1000), Duration::from_millis(2000)]
    );
}
