//! Exponential-backoff retry for rate-limited AI calls.
//!
//! Only failures that look like rate limiting are retried. Everything else
//! is returned to the caller after the first attempt. Callers must pass
//! operations that are safe to repeat.

use crate::error::{AppError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of invocations, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each one after.
    pub base_delay: Duration,
    /// Upper bound of the random delay added on top of the backoff.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy with no jitter, for deterministic schedules.
    pub fn without_jitter(mut self) -> Self {
        self.max_jitter = Duration::ZERO;
        self
    }

    /// Backoff before the retry that follows `attempt` (1-based), without
    /// jitter: `base * 2^(attempt - 1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay * 2u32.pow(exponent)
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        };
        self.backoff(attempt) + jitter
    }
}

/// Whether a failure is worth retrying.
///
/// Structured fields are checked first (HTTP 429, `RESOURCE_EXHAUSTED`);
/// the rendered message is searched as a fallback.
pub fn is_rate_limited(error: &AppError) -> bool {
    if let AppError::GeminiApi { code, status, .. } = error {
        if *code == Some(429) {
            return true;
        }
        if status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("resource_exhausted"))
        {
            return true;
        }
    }

    let message = error.to_string().to_lowercase();
    ["429", "resource_exhausted", "rate limiting"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Runs `operation`, retrying rate-limited failures per `policy`.
///
/// Returns [`AppError::RateLimited`] once every attempt was rate limited.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        warn!(attempt, error = %error, "AI call failed");

        if !is_rate_limited(&error) {
            return Err(error);
        }
        if attempt >= max_attempts {
            return Err(AppError::RateLimited(max_attempts));
        }

        let delay = policy.delay_after(attempt);
        info!(delay_ms = delay.as_millis() as u64, "rate limit hit, backing off");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tokio::time::Instant;

    #[test]
    fn structured_fields_are_checked_first() {
        assert!(is_rate_limited(&AppError::gemini_status(429, None, "slow down")));
        assert!(is_rate_limited(&AppError::GeminiApi {
            code: Some(400),
            status: Some("RESOURCE_EXHAUSTED".into()),
            message: "quota".into(),
        }));
    }

    #[test]
    fn message_fallback_is_case_insensitive() {
        assert!(is_rate_limited(&AppError::gemini("BadResponse { code: 429 }")));
        assert!(is_rate_limited(&AppError::gemini("Resource_Exhausted")));
        assert!(is_rate_limited(&AppError::Unknown("Rate Limiting in effect".into())));
        assert!(!is_rate_limited(&AppError::gemini("invalid argument")));
        assert!(!is_rate_limited(&AppError::frame("decode error")));
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_operation_is_tried_three_times() {
        let policy = RetryPolicy::default().without_jitter();
        let calls = RefCell::new(Vec::new());
        let started = Instant::now();

        let result: Result<()> = with_retry(&policy, || {
            calls.borrow_mut().push(started.elapsed());
            async { Err(AppError::gemini_status(429, None, "busy")) }
        })
        .await;

        assert!(matches!(result, Err(AppError::RateLimited(3))));
        let calls = calls.into_inner();
        assert_eq!(calls.len(), 3);
        let first_gap = calls[1] - calls[0];
        let second_gap = calls[2] - calls[1];
        assert_eq!(first_gap, Duration::from_millis(1000));
        assert_eq!(second_gap, Duration::from_millis(2000));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::default();
        let started = Instant::now();
        let _: Result<()> = with_retry(&policy, || async {
            Err(AppError::gemini("RESOURCE_EXHAUSTED"))
        })
        .await;
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(3000));
        assert!(waited < Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = RefCell::new(0);
        let result: Result<()> = with_retry(&policy, || {
            *calls.borrow_mut() += 1;
            async { Err(AppError::gemini("permission denied")) }
        })
        .await;
        assert!(matches!(result, Err(AppError::GeminiApi { .. })));
        assert_eq!(calls.into_inner(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_a_later_attempt_succeeds() {
        let policy = RetryPolicy::default();
        let calls = RefCell::new(0);
        let result = with_retry(&policy, || {
            *calls.borrow_mut() += 1;
            let n = *calls.borrow();
            async move {
                if n < 2 {
                    Err(AppError::gemini("429 Too Many Requests"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }
}
