//! Calendar Integration Credentials
//!
//! Resilient outbound API calls and the OAuth credential lifecycle of stored
//! calendar integrations.
//!
//! # Features
//!
//! - Resilient call executor: per-attempt timeout, 3 attempts, exponential backoff
//!   (1s, 2s), retry only on transient network errors, 5xx, 408 and 429
//! - Integration store over a GraphQL backend with sparse token mutations
//! - Credential lifecycle: stored token, refresh when expired, persist,
//!   disable the integration on unrecoverable failure
//! - Google and Zoom refresh token grants
//! - Deterministic AES-256-CBC token cipher for encrypted-at-rest tokens
//! - Scheduler API client
//!
//! # Example
//!
//! ```rust,ignore
//! use integrations_calendar_credentials::{ClientType, CredentialsClient, CredentialsConfigBuilder};
//! use secrecy::ExposeSecret;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CredentialsConfigBuilder::from_env()?.build()?;
//!     let client = CredentialsClient::from_config(config)?;
//!
//!     let token = client
//!         .google_access_token("user-id", "google_calendar", ClientType::AtomicWeb)
//!         .await?;
//!     println!("token length: {}", token.expose_secret().len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: integration records, refresh responses and configuration types
//! - `error`: error hierarchy and retry classification
//! - `core`: HTTP transport seam
//! - `resilience`: retry policy and the resilient call executor
//! - `cipher`: token encryption
//! - `store`: integration record store and GraphQL mutations
//! - `token`: provider refreshers and the credential lifecycle manager
//! - `scheduler`: scheduler API client
//! - `builders`: fluent configuration builder
//! - `telemetry`: tracing setup and header redaction
//! - `client`: high-level client combining all of the above

pub mod builders;
pub mod cipher;
pub mod client;
pub mod core;
pub mod error;
pub mod resilience;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod token;
pub mod types;

// Re-export main client
pub use client::{CredentialsClient, ZOOM_RESOURCE};

// Re-export builders
pub use builders::{credentials_config, CredentialsConfigBuilder};

// Re-export errors
pub use error::{
    is_retryable_status, ApiError, CipherError, ClassifiedError, ConfigurationError,
    CredentialError, CredentialsError, CredentialsResult, FailureKind, HttpError, NetworkError,
    NetworkErrorCode, ProtocolError,
};

// Re-export types
pub use types::{
    // Config
    CipherConfig, ClientCredentials, CredentialsConfig, GoogleOAuthConfig, GraphQlConfig,
    ZoomOAuthConfig,
    // Integration
    ClientType, IntegrationRecord,
    // Token
    RefreshResponse,
};

// Re-export core components
pub use crate::core::{
    create_mock_transport, create_transport, HttpMethod, HttpRequest, HttpResponse,
    HttpTransport, MockHttpTransport, ReqwestHttpTransport,
};

// Re-export resilience
pub use resilience::{
    decide, AttemptOutcome, CallAttempt, CallOptions, CallReport, MockSleeper, RequestBody,
    ResilientExecutor, ResponseType, RetryDecision, RetryPolicy, RetryStats, Sleeper,
    TokioSleeper, DEFAULT_RETRY_POLICY, MAX_RETRIES,
};

// Re-export cipher
pub use cipher::{EncryptedTokenPair, TokenCipher, TokenPair};

// Re-export store
pub use store::{
    create_mock_store, FieldUpdate, GraphQlIntegrationStore, IntegrationStore,
    MockIntegrationStore, TokenUpdate,
};

// Re-export token management
pub use token::{
    // Refresher
    create_mock_refresher, GoogleTokenRefresher, MockTokenRefresher, TokenRefresher,
    ZoomTokenRefresher,
    // Manager
    CredentialLifecycleManager, TokenManager,
};

// Re-export scheduler
pub use scheduler::{ScheduleMeetingRequest, SchedulerClient};

// Re-export telemetry
pub use telemetry::{init_tracing, redact_headers, LogFormat};
