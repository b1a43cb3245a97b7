//! Resilient Call Executor
//!
//! Runs one logical HTTP operation with bounded retries and exponential
//! backoff, and parses the response body.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

use super::retry::{RetryDecision, RetryPolicy, RetryStats, Sleeper, TokioSleeper, DEFAULT_TIMEOUT};
use crate::core::{lock, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::error::{
    ClassifiedError, CredentialsError, CredentialsResult, HttpError, NetworkError, ProtocolError,
};
use crate::telemetry::redact_headers;

/// Request body of a call.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized as JSON with `Content-Type: application/json`.
    Json(serde_json::Value),
    /// Serialized as `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
    Text(String),
}

/// How the response body is parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseType {
    #[default]
    Json,
    Text,
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub headers: HashMap<String, String>,
    pub body: RequestBody,
    /// Per-attempt timeout; the executor default applies when unset.
    pub timeout: Option<Duration>,
    pub response_type: ResponseType,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Text(body.into());
        self
    }

    /// HTTP Basic authentication.
    pub fn basic_auth(self, username: &str, password: &str) -> Self {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        self.header("Authorization", format!("Basic {encoded}"))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }
}

/// Outcome of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded { status: u16 },
    Failed(ClassifiedError),
}

/// Record of one attempt. Lives only for the duration of one call.
#[derive(Debug, Clone)]
pub struct CallAttempt {
    /// One-based attempt number.
    pub attempt_number: u32,
    pub method: HttpMethod,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

/// Raw result of a call together with its attempt log.
#[derive(Debug)]
pub struct CallReport {
    pub attempts: Vec<CallAttempt>,
    pub result: CredentialsResult<HttpResponse>,
}

/// Resilient call executor.
///
/// Owns the retry policy exclusively: transports must not retry on their own.
/// Attempts of one call are strictly sequential.
pub struct ResilientExecutor {
    transport: Arc<dyn HttpTransport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    default_timeout: Duration,
    stats: Mutex<RetryStats>,
}

impl ResilientExecutor {
    /// Create executor with the default policy and timeout.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            sleeper: Arc::new(TokioSleeper),
            policy: RetryPolicy::default(),
            default_timeout: DEFAULT_TIMEOUT,
            stats: Mutex::new(RetryStats::default()),
        }
    }

    /// Replace the backoff sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the default per-attempt timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Get retry statistics.
    pub fn get_stats(&self) -> RetryStats {
        lock(&self.stats).clone()
    }

    /// Execute a call and deserialize the JSON response body.
    ///
    /// An empty body deserializes as JSON `null`.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        url: &str,
        options: CallOptions,
        operation_name: &str,
    ) -> CredentialsResult<T> {
        let response = self
            .dispatch(method, url, options, operation_name)
            .await
            .result?;

        let body = if response.body.trim().is_empty() {
            "null"
        } else {
            response.body.as_str()
        };

        serde_json::from_str(body).map_err(|e| {
            ProtocolError::InvalidJson {
                message: format!("{operation_name}: {e}"),
            }
            .into()
        })
    }

    /// Execute a call and return the raw response body.
    pub async fn execute_text(
        &self,
        method: HttpMethod,
        url: &str,
        options: CallOptions,
        operation_name: &str,
    ) -> CredentialsResult<String> {
        let options = options.response_type(ResponseType::Text);
        let response = self
            .dispatch(method, url, options, operation_name)
            .await
            .result?;
        Ok(response.body)
    }

    /// Run the retry loop and return the final outcome with every attempt made.
    pub async fn dispatch(
        &self,
        method: HttpMethod,
        url: &str,
        options: CallOptions,
        operation_name: &str,
    ) -> CallReport {
        let max_attempts = self.policy.max_attempts;
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let request = match build_request(method, url, options, timeout) {
            Ok(request) => request,
            Err(e) => {
                return CallReport {
                    attempts: Vec::new(),
                    result: Err(e),
                }
            }
        };
        let logged_headers = redact_headers(&request.headers);

        let mut attempts = Vec::new();
        let mut last_error = None;
        let mut attempt = 0;

        while attempt < max_attempts {
            let attempt_number = attempt + 1;
            info!(
                operation = operation_name,
                attempt = attempt_number,
                max_attempts,
                method = method.as_str(),
                url,
                headers = ?logged_headers,
                "[{operation_name}] Attempt {attempt_number}/{max_attempts} - {method} {url}"
            );
            lock(&self.stats).total_attempts += 1;

            let started_at = Utc::now();
            match self.send_once(request.clone(), timeout).await {
                Ok(response) => {
                    info!(
                        operation = operation_name,
                        attempt = attempt_number,
                        status = response.status,
                        "[{operation_name}] Attempt {attempt_number} successful."
                    );
                    attempts.push(CallAttempt {
                        attempt_number,
                        method,
                        url: url.to_string(),
                        started_at,
                        outcome: AttemptOutcome::Succeeded {
                            status: response.status,
                        },
                    });
                    if attempt > 0 {
                        lock(&self.stats).successful_retries += 1;
                    }
                    return CallReport {
                        attempts,
                        result: Ok(response),
                    };
                }
                Err(err) => {
                    let classified = err.classify();
                    warn!(
                        operation = operation_name,
                        attempt = attempt_number,
                        max_attempts,
                        error = %err,
                        status = ?classified.http_status,
                        error_code = ?classified.network_error_code.as_ref().map(|c| c.as_str()),
                        "[{operation_name}] Attempt {attempt_number}/{max_attempts} failed."
                    );
                    attempts.push(CallAttempt {
                        attempt_number,
                        method,
                        url: url.to_string(),
                        started_at,
                        outcome: AttemptOutcome::Failed(classified.clone()),
                    });
                    last_error = Some(err);

                    match self.policy.decide(attempt, &classified) {
                        RetryDecision::Retry(delay) => {
                            info!(
                                operation = operation_name,
                                delay_ms = delay.as_millis() as u64,
                                "[{operation_name}] Waiting {}ms before retry",
                                delay.as_millis()
                            );
                            self.sleeper.sleep(delay).await;
                            attempt += 1;
                        }
                        RetryDecision::GiveUp => {
                            if !classified.is_retryable {
                                error!(
                                    operation = operation_name,
                                    "[{operation_name}] Non-retryable error encountered. Aborting retries."
                                );
                            }
                            break;
                        }
                    }
                }
            }
        }

        error!(
            operation = operation_name,
            attempts = attempts.len(),
            method = method.as_str(),
            url,
            "[{operation_name}] Failed after {} attempts.",
            attempts.len()
        );
        lock(&self.stats).failed_operations += 1;

        let error = last_error.unwrap_or_else(|| CredentialsError::RetriesExhausted {
            operation: operation_name.to_string(),
            method: method.as_str().to_string(),
            url: url.to_string(),
        });
        CallReport {
            attempts,
            result: Err(error),
        }
    }

    /// One attempt: transport call bounded by the timeout, status >= 400 is a failure.
    async fn send_once(
        &self,
        request: HttpRequest,
        timeout: Duration,
    ) -> CredentialsResult<HttpResponse> {
        let response = tokio::time::timeout(timeout, self.transport.send(request))
            .await
            .map_err(|_| NetworkError::timeout(timeout))??;

        if !response.is_success() {
            return Err(HttpError::new(response.status, response.status_text, response.body).into());
        }
        Ok(response)
    }
}

fn build_request(
    method: HttpMethod,
    url: &str,
    options: CallOptions,
    timeout: Duration,
) -> CredentialsResult<HttpRequest> {
    let mut headers = options.headers;

    let body = match options.body {
        RequestBody::Empty => None,
        RequestBody::Json(value) => {
            set_default_header(&mut headers, "Content-Type", "application/json");
            Some(value.to_string())
        }
        RequestBody::Form(fields) => {
            set_default_header(
                &mut headers,
                "Content-Type",
                "application/x-www-form-urlencoded",
            );
            let encoded = serde_urlencoded::to_string(&fields).map_err(|e| {
                ProtocolError::InvalidJson {
                    message: format!("form encoding failed: {e}"),
                }
            })?;
            Some(encoded)
        }
        RequestBody::Text(text) => Some(text),
    };

    if options.response_type == ResponseType::Json {
        set_default_header(&mut headers, "Accept", "application/json");
    }

    Ok(HttpRequest {
        method,
        url: url.to_string(),
        headers,
        body,
        timeout: Some(timeout),
    })
}

fn set_default_header(headers: &mut HashMap<String, String>, name: &str, value: &str) {
    if !headers.keys().any(|k| k.eq_ignore_ascii_case(name)) {
        headers.insert(name.to_string(), value.to_string());
    }
}
