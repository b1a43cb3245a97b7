//! Resilience
//!
//! Retry policy and the resilient call executor.
//!
//! Every outbound call goes through [`ResilientExecutor`], which makes at most
//! [`MAX_RETRIES`] attempts and waits 1s then 2s between retryable failures.

pub mod executor;
pub mod retry;

// Retry
pub use retry::{
    decide, MockSleeper, RetryDecision, RetryPolicy, RetryStats, Sleeper, TokioSleeper,
    DEFAULT_RETRY_POLICY, DEFAULT_TIMEOUT, MAX_RETRIES,
};

// Executor
pub use executor::{
    AttemptOutcome, CallAttempt, CallOptions, CallReport, RequestBody, ResilientExecutor,
    ResponseType,
};
