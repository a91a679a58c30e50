//! Bounded retries with exponential backoff and jitter
//!
//! Every fetch strategy funnels its network calls through [`execute`]. The
//! attempt function reports failures as an [`AttemptError`] carrying an
//! [`ErrorClass`]; only `Retryable` failures are attempted again.
//!
//! | Condition                 | Class          |
//! |---------------------------|----------------|
//! | Connection failure        | Retryable      |
//! | Timeout                   | Retryable      |
//! | HTTP 5xx                  | Retryable      |
//! | HTTP 429                  | Retryable      |
//! | DNS resolution failure    | Fatal          |
//! | HTTP 4xx (not 403/429)    | Fatal          |
//! | HTTP 403                  | Blocked        |
//! | Optional capability gone  | Unavailable    |

use crate::config::RetryConfig;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

/// Retry policy for a fetch strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 8000,
            jitter_ms: 500,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter_ms: config.jitter_ms,
        }
    }
}

impl RetryPolicy {
    /// Deterministic part of the delay before `attempt` (2-based: the first
    /// retry is attempt 2)
    ///
    /// `min(base * 2^(attempt-1), max)`
    pub fn base_delay_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let scaled = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX));
        Duration::from_millis(scaled.min(self.max_delay_ms))
    }
}

/// Delay before `attempt`, with the given jitter (already sampled, in ms)
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32, jitter_ms: u64) -> Duration {
    policy.base_delay_before(attempt) + Duration::from_millis(jitter_ms.min(policy.jitter_ms))
}

/// Samples a jitter value in `[0, policy.jitter_ms]`
pub fn sample_jitter(policy: &RetryPolicy) -> u64 {
    if policy.jitter_ms == 0 {
        return 0;
    }
    rand::rng().random_range(0..=policy.jitter_ms)
}

/// How a failed attempt should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Transient: connection failure, timeout, 5xx, 429
    Retryable,
    /// Permanent: DNS failure, 4xx other than 403/429, malformed response
    Fatal,
    /// Anti-automation verdict (HTTP 403); terminal for the URL
    Blocked,
    /// An optional capability is missing; try the next strategy
    Unavailable,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable)
    }
}

/// Classifies an HTTP status code
///
/// Returns None for success codes.
pub fn classify_status(status: u16) -> Option<ErrorClass> {
    match status {
        200..=399 => None,
        403 => Some(ErrorClass::Blocked),
        429 => Some(ErrorClass::Retryable),
        400..=499 => Some(ErrorClass::Fatal),
        _ => Some(ErrorClass::Retryable),
    }
}

/// Classifies a transport-level reqwest error
///
/// DNS failures are permanent for the duration of a batch; other connect
/// errors and timeouts are worth another try.
pub fn classify_transport_error(error: &reqwest::Error) -> ErrorClass {
    if error.is_timeout() {
        return ErrorClass::Retryable;
    }
    if is_dns_failure(error) {
        return ErrorClass::Fatal;
    }
    if error.is_connect() || error.is_request() || error.is_body() {
        return ErrorClass::Retryable;
    }
    ErrorClass::Fatal
}

fn is_dns_failure(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = current {
        let text = err.to_string().to_lowercase();
        if text.contains("dns error")
            || text.contains("failed to lookup address")
            || text.contains("name or service not known")
            || text.contains("no such host")
        {
            return true;
        }
        current = err.source();
    }
    false
}

/// A failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptError {
    pub class: ErrorClass,
    pub message: String,
    pub status_code: Option<u16>,
}

impl AttemptError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
            status_code: None,
        }
    }

    /// Builds an error from a non-success HTTP status
    pub fn from_status(status: u16) -> Self {
        let class = classify_status(status).unwrap_or(ErrorClass::Fatal);
        let message = match class {
            ErrorClass::Blocked => format!("HTTP {} (blocked by anti-automation defenses)", status),
            _ => format!("HTTP {}", status),
        };
        Self {
            class,
            message,
            status_code: Some(status),
        }
    }

    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        Self {
            class: classify_transport_error(error),
            message: error.to_string(),
            status_code: error.status().map(|s| s.as_u16()),
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// What the executor hands back to the fetcher
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, AttemptError>,
    /// Attempts actually made (1-based)
    pub attempts: u32,
    /// Total time spent sleeping between attempts
    pub total_delay: Duration,
    pub elapsed: Duration,
}

/// Runs `attempt_fn` until it succeeds, fails non-retryably, or the policy's
/// attempt budget is exhausted
///
/// The attempt number (1-based) is passed to `attempt_fn`. Exhausting the
/// budget returns the last error; callers never retry past this boundary.
pub async fn execute<T, F, Fut>(policy: &RetryPolicy, mut attempt_fn: F) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let started = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut total_delay = Duration::ZERO;
    let mut attempt = 1;

    loop {
        match attempt_fn(attempt).await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                    total_delay,
                    elapsed: started.elapsed(),
                };
            }
            Err(error) => {
                if !error.class.is_retryable() || attempt >= max_attempts {
                    if error.class.is_retryable() {
                        tracing::debug!(
                            "Giving up after {} attempts: {}",
                            attempt,
                            error.message
                        );
                    }
                    return RetryOutcome {
                        result: Err(error),
                        attempts: attempt,
                        total_delay,
                        elapsed: started.elapsed(),
                    };
                }

                attempt += 1;
                let delay = backoff_delay(policy, attempt, sample_jitter(policy));
                tracing::debug!(
                    "Attempt {} failed ({}); retrying in {:?}",
                    attempt - 1,
                    error.message,
                    delay
                );
                total_delay += delay;
                tokio::time::sleep(delay).await;
            }
        }
    }
}
