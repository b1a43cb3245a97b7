//! HTTP Transport
//!
//! HTTP client interface and implementations for outbound API calls.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use super::lock;
use crate::error::{
    ConfigurationError, CredentialsError, NetworkError, NetworkErrorCode, ProtocolError,
};

/// HTTP request definition.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<String>,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

/// HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = CredentialsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "patch" => Ok(Self::Patch),
            "put" => Ok(Self::Put),
            "delete" => Ok(Self::Delete),
            _ => Err(ProtocolError::UnsupportedMethod {
                method: s.to_string(),
            }
            .into()),
        }
    }
}

/// HTTP response definition.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Status text.
    pub status_text: String,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Build a response with a JSON body.
    pub fn json<T: serde::Serialize>(status: u16, body: &T) -> Result<Self, CredentialsError> {
        let body = serde_json::to_string(body).map_err(|e| ProtocolError::InvalidJson {
            message: e.to_string(),
        })?;
        Ok(Self {
            status,
            status_text: reason_phrase(status).to_string(),
            headers: [("content-type".to_string(), "application/json".to_string())]
                .into_iter()
                .collect(),
            body,
        })
    }

    /// Build a plain text response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: reason_phrase(status).to_string(),
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

fn reason_phrase(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

/// HTTP transport interface (for dependency injection).
///
/// Implementations return `Ok` for every HTTP response regardless of status;
/// the caller decides what counts as failure.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CredentialsError>;
}

/// Default reqwest-based HTTP transport.
///
/// Redirects are not followed and the client performs no retries of its own.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl ReqwestHttpTransport {
    /// Create new transport with the default 15 second timeout.
    pub fn new() -> Result<Self, CredentialsError> {
        Self::with_timeout(Duration::from_millis(15_000))
    }

    /// Create transport with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, CredentialsError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigurationError::HttpClient {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CredentialsError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Patch => self.client.patch(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let response = req_builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_string();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.as_str().to_lowercase(), v.to_string());
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        Ok(HttpResponse {
            status,
            status_text,
            headers,
            body,
        })
    }
}

/// Map a reqwest failure to a network error carrying an OS-level code.
fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> CredentialsError {
    if error.is_timeout() {
        return NetworkError::timeout(timeout).into();
    }

    let mut code = None;
    let mut source: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            code = NetworkErrorCode::from_io_error(io);
            if code.is_some() {
                break;
            }
        }
        let message = err.to_string();
        if message.contains("Temporary failure in name resolution") {
            code = Some(NetworkErrorCode::DnsTemporaryFailure);
            break;
        }
        source = err.source();
    }

    NetworkError::new(code, error.to_string()).into()
}

/// Mock HTTP transport for testing.
///
/// Queued outcomes are returned in the order they were queued.
#[derive(Default)]
pub struct MockHttpTransport {
    outcomes: Mutex<VecDeque<Result<HttpResponse, MockFailure>>>,
    request_history: Mutex<Vec<HttpRequest>>,
    default_response: Mutex<Option<HttpResponse>>,
}

/// Network failure replayed by [`MockHttpTransport`].
#[derive(Clone, Debug)]
pub struct MockFailure {
    pub code: Option<NetworkErrorCode>,
    pub message: String,
}

impl MockHttpTransport {
    /// Create new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to return.
    pub fn queue_response(&self, response: HttpResponse) -> &Self {
        lock(&self.outcomes).push_back(Ok(response));
        self
    }

    /// Queue a JSON response.
    pub fn queue_json_response<T: serde::Serialize>(&self, status: u16, body: &T) -> &Self {
        let response = HttpResponse::json(status, body)
            .unwrap_or_else(|e| HttpResponse::text(status, e.to_string()));
        self.queue_response(response)
    }

    /// Queue a network failure with the given code.
    pub fn queue_network_error(&self, code: NetworkErrorCode) -> &Self {
        let message = format!("connect {}", code.as_str());
        lock(&self.outcomes).push_back(Err(MockFailure {
            code: Some(code),
            message,
        }));
        self
    }

    /// Set default response when queue is empty.
    pub fn set_default_response(&self, response: HttpResponse) -> &Self {
        *lock(&self.default_response) = Some(response);
        self
    }

    /// Get request history.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        lock(&self.request_history).clone()
    }

    /// Get last request.
    pub fn get_last_request(&self) -> Option<HttpRequest> {
        lock(&self.request_history).last().cloned()
    }

    /// Number of requests sent.
    pub fn request_count(&self) -> usize {
        lock(&self.request_history).len()
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CredentialsError> {
        lock(&self.request_history).push(request);

        let queued = lock(&self.outcomes).pop_front();
        let outcome = queued.or_else(|| lock(&self.default_response).clone().map(Ok));

        match outcome {
            Some(Ok(response)) => Ok(response),
            Some(Err(failure)) => Err(NetworkError::new(failure.code, failure.message).into()),
            None => Err(NetworkError::new(None, "No mock response available").into()),
        }
    }
}

/// Create production HTTP transport.
pub fn create_transport(timeout: Option<Duration>) -> Result<ReqwestHttpTransport, CredentialsError> {
    match timeout {
        Some(t) => ReqwestHttpTransport::with_timeout(t),
        None => ReqwestHttpTransport::new(),
    }
}

/// Create mock HTTP transport for testing.
pub fn create_mock_transport() -> MockHttpTransport {
    MockHttpTransport::new()
}
