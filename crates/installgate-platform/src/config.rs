//! Client configuration and retry policy

use rand::Rng;
use std::time::Duration;

/// Bounded retry policy for outbound platform requests
///
/// Only transport failures are retried: connect failures for any method,
/// timeouts only for idempotent methods. HTTP statuses and response bodies
/// are never a reason to retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (1 = fail fast)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound on the delay between attempts
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// No retries
    pub fn fail_fast() -> Self {
        Self::default()
    }

    /// Retry up to `max_attempts` total attempts with default backoff
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, exponential with jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let max_ms = self.max_backoff.as_millis() as u64;
        let mut backoff_ms = self.initial_backoff.as_millis() as u64;
        for _ in 1..attempt {
            backoff_ms = backoff_ms.saturating_mul(2);
            if backoff_ms >= max_ms {
                backoff_ms = max_ms;
                break;
            }
        }

        let jitter_max = std::cmp::max(backoff_ms / 2, 1);
        let jitter = rand::thread_rng().gen_range(0..jitter_max);
        Duration::from_millis(backoff_ms + jitter)
    }
}

/// Platform client configuration
#[derive(Debug, Clone)]
pub struct PlatformClientConfig {
    /// Per-request timeout, applied to both the token exchange and the API call
    pub timeout: Duration,

    /// Retry policy for transport failures
    pub retry: RetryPolicy,

    /// Reuse access tokens per installation and user for this long.
    /// `None` re-mints and re-exchanges on every call.
    pub token_cache_ttl: Option<Duration>,
}

impl Default for PlatformClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            token_cache_ttl: None,
        }
    }
}

impl PlatformClientConfig {
    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enable the access-token cache
    pub fn with_token_cache(mut self, ttl: Duration) -> Self {
        self.token_cache_ttl = Some(ttl);
        self
    }
}
