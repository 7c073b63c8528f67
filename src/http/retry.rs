//! Retry policy for API calls: which failures are transient and how long to wait.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::request::ApiRequest;
use super::response::FailureDetail;

/// Default upper bound on the total time spent retrying one logical call.
pub const DEFAULT_MAX_RETRY_DURATION_MILLIS: u64 = 15_000;

/// API error codes that are worth retrying.
///
/// This is a closed set taken from the API's error-code contract; other codes
/// are surfaced to the caller immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryableErrorCode {
    /// The service is offline for maintenance.
    SystemMaintenance,
    /// The server timed out handling the request.
    ServerTimeout,
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Unexpected server-side error.
    UnexpectedError,
}

impl RetryableErrorCode {
    pub const ALL: [RetryableErrorCode; 4] = [
        RetryableErrorCode::SystemMaintenance,
        RetryableErrorCode::ServerTimeout,
        RetryableErrorCode::RateLimitExceeded,
        RetryableErrorCode::UnexpectedError,
    ];

    pub fn code(self) -> i64 {
        match self {
            RetryableErrorCode::SystemMaintenance => 4001,
            RetryableErrorCode::ServerTimeout => 4002,
            RetryableErrorCode::RateLimitExceeded => 4003,
            RetryableErrorCode::UnexpectedError => 4004,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

/// Returns true if the failure carries one of the [`RetryableErrorCode`]s.
pub fn is_retryable(failure: &FailureDetail) -> bool {
    failure
        .error_code
        .and_then(RetryableErrorCode::from_code)
        .is_some()
}

/// Computes the wait before the next attempt, in milliseconds.
///
/// Receives the 0-based number of the attempt that just failed and its failure.
/// A negative result stops retrying.
#[derive(Clone)]
pub struct BackoffFn(Arc<dyn Fn(u32, &FailureDetail) -> i64 + Send + Sync>);

impl BackoffFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(u32, &FailureDetail) -> i64 + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// `(2^attempt + random[0, 1)) * 1000` milliseconds.
    pub fn exponential_jitter() -> Self {
        Self::new(|attempt, _| {
            let base = 2f64.powi(attempt.min(62) as i32);
            ((base + rand::random::<f64>()) * 1000.0) as i64
        })
    }

    pub fn calc(&self, attempt: u32, failure: &FailureDetail) -> i64 {
        (self.0)(attempt, failure)
    }
}

impl fmt::Debug for BackoffFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BackoffFn")
    }
}

impl Default for BackoffFn {
    fn default() -> Self {
        Self::exponential_jitter()
    }
}

/// Retry knobs for one call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retry_duration: Duration,
    pub backoff: BackoffFn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_duration: Duration::from_millis(DEFAULT_MAX_RETRY_DURATION_MILLIS),
            backoff: BackoffFn::default(),
        }
    }
}

impl RetryPolicy {
    /// Applies the request's overrides on top of these defaults.
    pub fn resolve(&self, request: &ApiRequest) -> RetryPolicy {
        RetryPolicy {
            max_retry_duration: request
                .max_retry_duration_millis
                .map(Duration::from_millis)
                .unwrap_or(self.max_retry_duration),
            backoff: request
                .calc_retry_backoff
                .clone()
                .unwrap_or_else(|| self.backoff.clone()),
        }
    }
}

/// What the retry loop does after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then run attempt number `attempt`.
    Retry { attempt: u32, delay: Duration },
    /// Stop; `attempt` is the number of the last attempt made.
    GiveUp { attempt: u32 },
}

/// Mutable state of one logical call's retry loop.
///
/// The deadline is fixed when the state is created and never moves.
#[derive(Debug)]
pub struct AttemptState {
    attempt: u32,
    deadline: Instant,
    backoff: BackoffFn,
}

impl AttemptState {
    pub fn start(policy: RetryPolicy, now: Instant) -> Self {
        Self {
            attempt: 0,
            deadline: now + policy.max_retry_duration,
            backoff: policy.backoff,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Decides whether `failure` ends the call or schedules another attempt.
    pub fn decide(&mut self, failure: &FailureDetail, now: Instant) -> RetryDecision {
        if !is_retryable(failure) {
            return RetryDecision::GiveUp {
                attempt: self.attempt,
            };
        }

        let backoff = self.backoff.calc(self.attempt, failure);
        if backoff < 0 {
            return RetryDecision::GiveUp {
                attempt: self.attempt,
            };
        }

        let delay = Duration::from_millis(backoff as u64);
        if now + delay >= self.deadline {
            return RetryDecision::GiveUp {
                attempt: self.attempt,
            };
        }

        self.attempt += 1;
        RetryDecision::Retry {
            attempt: self.attempt,
            delay,
        }
    }
}
