//! Scheduler API
//!
//! Client for the meeting scheduling service.

use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::core::HttpMethod;
use crate::error::{ApiError, CredentialsError, CredentialsResult, HttpError, ProtocolError};
use crate::resilience::{CallOptions, ResilientExecutor};

/// Operation name used in logs and error messages.
pub const SCHEDULE_MEETING_OPERATION: &str = "scheduleMeeting";

/// Meeting request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMeetingRequest {
    pub participant_names: Vec<String>,
    pub duration_minutes: u32,
    /// `YYYY-MM-DD`.
    pub preferred_date: String,
    /// `HH:mm`.
    pub preferred_start_time_from: String,
    /// `HH:mm`.
    pub preferred_start_time_to: String,
}

/// Scheduler API client.
pub struct SchedulerClient {
    executor: Arc<ResilientExecutor>,
    base_url: String,
}

impl SchedulerClient {
    pub fn new(executor: Arc<ResilientExecutor>, base_url: impl Into<String>) -> Self {
        Self {
            executor,
            base_url: base_url.into(),
        }
    }

    /// Ask the scheduler to place a meeting.
    ///
    /// HTTP failures surface as [`ApiError`] carrying the response's `message`
    /// field, or its raw body when that is not JSON.
    pub async fn schedule_meeting(
        &self,
        request: &ScheduleMeetingRequest,
    ) -> CredentialsResult<serde_json::Value> {
        let url = format!(
            "{}/timeTable/user/scheduleMeeting",
            self.base_url.trim_end_matches('/')
        );
        let body = serde_json::to_value(request).map_err(|e| ProtocolError::InvalidJson {
            message: e.to_string(),
        })?;

        let result = self
            .executor
            .execute(
                HttpMethod::Post,
                &url,
                CallOptions::new().json(body),
                SCHEDULE_MEETING_OPERATION,
            )
            .await;

        match result {
            Err(CredentialsError::Http(http)) => {
                let message = api_error_message(&http);
                error!(
                    operation = SCHEDULE_MEETING_OPERATION,
                    status = http.status,
                    message = %message,
                    "Scheduler API returned an error"
                );
                Err(ApiError {
                    operation: SCHEDULE_MEETING_OPERATION.to_string(),
                    message,
                }
                .into())
            }
            other => other,
        }
    }
}

/// `message` of a JSON error body, else the raw body, else the status line.
fn api_error_message(error: &HttpError) -> String {
    if let Ok(serde_json::Value::Object(body)) = serde_json::from_str(&error.body) {
        if let Some(message) = body.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    if error.body.trim().is_empty() {
        return error.to_string();
    }
    error.body.clone()
}
