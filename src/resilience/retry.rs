//! Retry Policy
//!
//! Bounded exponential backoff without jitter, expressed as a pure decision
//! function so the executor loop stays free of policy details.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::core::lock;
use crate::error::ClassifiedError;

/// Maximum number of attempts per logical call.
pub const MAX_RETRIES: u32 = 3;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each later one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        DEFAULT_RETRY_POLICY
    }
}

/// Default retry policy: 3 attempts, waits of 1s then 2s.
pub const DEFAULT_RETRY_POLICY: RetryPolicy = RetryPolicy {
    max_attempts: MAX_RETRIES,
    base_delay: Duration::from_millis(1000),
};

/// Outcome of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given delay, then try again.
    Retry(Duration),
    /// Stop and surface the error.
    GiveUp,
}

impl RetryPolicy {
    /// Decide what happens after the attempt at zero-based index `attempt` failed.
    pub fn decide(&self, attempt: u32, error: &ClassifiedError) -> RetryDecision {
        if !error.is_retryable || attempt + 1 >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(self.backoff_delay(attempt))
    }

    /// `base_delay * 2^attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }
}

/// Decide with the default policy.
pub fn decide(attempt: u32, error: &ClassifiedError) -> RetryDecision {
    DEFAULT_RETRY_POLICY.decide(attempt, error)
}

/// Retry statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub total_attempts: u32,
    pub successful_retries: u32,
    pub failed_operations: u32,
}

/// Suspension between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Mock sleeper that records requested delays and returns immediately.
#[derive(Default)]
pub struct MockSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl MockSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn get_delays(&self) -> Vec<Duration> {
        lock(&self.delays).clone()
    }
}

#[async_trait]
impl Sleeper for MockSleeper {
    async fn sleep(&self, delay: Duration) {
        lock(&self.delays).push(delay);
    }
}
