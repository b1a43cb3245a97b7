//! Error Types
//!
//! Error hierarchy for resilient calls, integration storage and the
//! credential lifecycle, plus the retry classification used by the executor.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Root error type for the crate.
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("[{operation}] Failed after all retries for {method} {url}.")]
    RetriesExhausted {
        operation: String,
        method: String,
        url: String,
    },
}

impl CredentialsError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CREDENTIALS_CONFIG",
            Self::Network(_) => "CREDENTIALS_NETWORK",
            Self::Http(_) => "CREDENTIALS_HTTP",
            Self::Protocol(_) => "CREDENTIALS_PROTOCOL",
            Self::Credential(_) => "CREDENTIALS_LIFECYCLE",
            Self::Cipher(_) => "CREDENTIALS_CIPHER",
            Self::Api(_) => "CREDENTIALS_API",
            Self::RetriesExhausted { .. } => "CREDENTIALS_RETRIES_EXHAUSTED",
        }
    }

    /// HTTP status of the failed response, if the error came from one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http(e) => Some(e.status),
            _ => None,
        }
    }

    /// OS-level network error code, if the error came from the transport.
    pub fn network_code(&self) -> Option<&NetworkErrorCode> {
        match self {
            Self::Network(e) => e.code.as_ref(),
            _ => None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.failure_kind().is_retryable()
    }

    /// Check if the integration has to be re-authorized by the user.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::Credential(CredentialError::NoIntegration)
                | Self::Credential(CredentialError::NoRefreshToken)
                | Self::Credential(CredentialError::MissingAccessToken)
                | Self::Credential(CredentialError::RefreshFailed { .. })
        )
    }

    /// Failure category used by the retry policy.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Network(e) if e.is_retryable() => FailureKind::TransientNetwork,
            Self::Http(e) if e.is_retryable() => FailureKind::TransientServer,
            Self::Http(_) => FailureKind::PermanentClient,
            _ => FailureKind::Permanent,
        }
    }

    /// Derive the classified view of this error.
    pub fn classify(&self) -> ClassifiedError {
        let kind = self.failure_kind();
        ClassifiedError {
            http_status: self.status_code(),
            network_error_code: self.network_code().cloned(),
            is_retryable: kind.is_retryable(),
            kind,
            message: self.to_string(),
        }
    }
}

/// Failure category of a raw error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Recognized OS-level connection error.
    TransientNetwork,
    /// HTTP 408, 429 or 5xx.
    TransientServer,
    /// Any other HTTP 4xx.
    PermanentClient,
    /// Everything else, including unrecognized network codes.
    Permanent,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork | Self::TransientServer)
    }
}

/// Classified view of a transport failure. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub http_status: Option<u16>,
    pub network_error_code: Option<NetworkErrorCode>,
    pub is_retryable: bool,
    pub kind: FailureKind,
    pub message: String,
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("No OAuth client configured for client type: {client_type}")]
    UnsupportedClientType { client_type: String },

    #[error("Failed to build HTTP client: {message}")]
    HttpClient { message: String },
}

/// OS-level network error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkErrorCode {
    TimedOut,
    ConnectionReset,
    AddressInUse,
    ConnectionRefused,
    BrokenPipe,
    NetworkUnreachable,
    DnsTemporaryFailure,
    Other(String),
}

impl NetworkErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::TimedOut => "ETIMEDOUT",
            Self::ConnectionReset => "ECONNRESET",
            Self::AddressInUse => "EADDRINUSE",
            Self::ConnectionRefused => "ECONNREFUSED",
            Self::BrokenPipe => "EPIPE",
            Self::NetworkUnreachable => "ENETUNREACH",
            Self::DnsTemporaryFailure => "EAI_AGAIN",
            Self::Other(code) => code,
        }
    }

    /// Parse a code string such as `ECONNRESET`.
    pub fn parse(code: &str) -> Self {
        match code {
            "ETIMEDOUT" => Self::TimedOut,
            "ECONNRESET" => Self::ConnectionReset,
            "EADDRINUSE" => Self::AddressInUse,
            "ECONNREFUSED" => Self::ConnectionRefused,
            "EPIPE" => Self::BrokenPipe,
            "ENETUNREACH" => Self::NetworkUnreachable,
            "EAI_AGAIN" => Self::DnsTemporaryFailure,
            other => Self::Other(other.to_string()),
        }
    }

    /// Map an I/O error to a code. Returns `None` when nothing is recognizable.
    pub fn from_io_error(error: &std::io::Error) -> Option<Self> {
        use std::io::ErrorKind;

        let code = match error.kind() {
            ErrorKind::TimedOut => Self::TimedOut,
            ErrorKind::ConnectionReset => Self::ConnectionReset,
            ErrorKind::AddrInUse => Self::AddressInUse,
            ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            ErrorKind::BrokenPipe => Self::BrokenPipe,
            ErrorKind::NetworkUnreachable => Self::NetworkUnreachable,
            ErrorKind::ConnectionAborted => Self::Other("ECONNABORTED".to_string()),
            ErrorKind::NotFound => Self::Other("ENOTFOUND".to_string()),
            _ => {
                let message = error.to_string();
                if message.contains("Temporary failure in name resolution") {
                    Self::DnsTemporaryFailure
                } else if message.contains("failed to lookup address") {
                    Self::Other("ENOTFOUND".to_string())
                } else {
                    return None;
                }
            }
        };
        Some(code)
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for NetworkErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network/transport error.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct NetworkError {
    pub code: Option<NetworkErrorCode>,
    pub message: String,
}

impl NetworkError {
    pub fn new(code: Option<NetworkErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Per-attempt timeout elapsed.
    pub fn timeout(timeout: Duration) -> Self {
        Self::new(
            Some(NetworkErrorCode::TimedOut),
            format!("Timeout awaiting request for {}ms", timeout.as_millis()),
        )
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.as_ref().map(|c| c.is_retryable()).unwrap_or(false)
    }
}

/// HTTP response with status >= 400.
#[derive(Error, Debug, Clone)]
#[error("Response code {status} ({reason})")]
pub struct HttpError {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl HttpError {
    pub fn new(status: u16, reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            body: body.into(),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        is_retryable_status(self.status)
    }
}

/// 408, 429 and every 5xx are retryable.
pub fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Unsupported HTTP method: {method}")]
    UnsupportedMethod { method: String },

    #[error("GraphQL operation {operation} returned errors: {messages}")]
    GraphQl { operation: String, messages: String },

    #[error("GraphQL operation {operation} returned no data")]
    MissingData { operation: String },

    #[error("Token lifetime out of range: {expires_in}s")]
    InvalidExpiry { expires_in: i64 },
}

/// Domain-level credential failures. Always terminal.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("No calendar integration available.")]
    NoIntegration,

    #[error("No refresh token provided from calendar integration.")]
    NoRefreshToken,

    #[error("Token refresh failed to return an access token.")]
    MissingAccessToken,

    #[error("Token refresh failed: {source}")]
    RefreshFailed {
        #[source]
        source: Box<CredentialsError>,
    },
}

/// Token cipher error.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("Invalid key material: {message}")]
    InvalidKeyMaterial { message: String },

    #[error("Invalid ciphertext: {message}")]
    InvalidCiphertext { message: String },

    #[error("Decrypted token is not valid UTF-8")]
    InvalidUtf8,
}

/// Failure reported by a downstream API in its response body.
#[derive(Error, Debug)]
#[error("API Error from {operation}: {message}")]
pub struct ApiError {
    pub operation: String,
    pub message: String,
}

/// Result type for crate operations.
pub type CredentialsResult<T> = Result<T, CredentialsError>;
