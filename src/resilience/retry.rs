use super::CircuitBreaker;
use crate::types::{AppError, Result};
use std::future::Future;
use std::time::Duration;

/// Default number of total attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry; doubles on each further retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A policy that never retries.
    pub fn single_attempt() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Backoff after the zero-based `attempt` failed: `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Run `operation` until it succeeds or the policy gives up.
///
/// Stops early when the error is not retryable or when `breaker` has opened.
/// The error from the last attempt is the one returned.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    breaker: &CircuitBreaker,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let err = match operation(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(backend = breaker.name(), attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(err);
        }

        if attempt + 1 >= max_attempts {
            tracing::warn!(
                backend = breaker.name(),
                attempts = max_attempts,
                error = %err,
                "Retries exhausted"
            );
            return Err(err);
        }

        if breaker.is_open() {
            tracing::debug!(backend = breaker.name(), "Breaker open, not retrying");
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(
            backend = breaker.name(),
            attempt = attempt + 1,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Convert a panic payload into an internal error without exposing it.
pub fn panic_to_error(payload: Box<dyn std::any::Any + Send>) -> AppError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(panic = %detail, "Worker panicked");
    AppError::Internal(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::BreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("worker", BreakerConfig::default())
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_surfaces_last_error_after_exhaustion() {
        let b = breaker();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<()> = with_retry(&RetryPolicy::default(), &b, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(AppError::BackendUnavailable(format!("attempt {}", attempt))) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(AppError::BackendUnavailable(msg)) => assert_eq!(msg, "attempt 2"),
            other => panic!("unexpected result: {:?}", other),
        }
        // 1s + 2s of backoff between the three attempts.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_later_attempt() {
        let b = breaker();
        let calls = AtomicU32::new(0);

        let result = with_retry(&RetryPolicy::default(), &b, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(AppError::BackendTimeout("worker".into()))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_returns_immediately() {
        let b = breaker();
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(&RetryPolicy::default(), &b, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::CircuitOpen("worker".into())) }
        })
        .await;

        assert!(matches!(result, Err(AppError::CircuitOpen(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_retrying_once_breaker_opens() {
        let b = CircuitBreaker::new(
            "worker",
            BreakerConfig {
                failure_threshold: 1,
                ..BreakerConfig::default()
            },
        );
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(&RetryPolicy::default(), &b, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            b.call(async { Err(AppError::BackendUnavailable("down".into())) })
        })
        .await;

        assert!(matches!(result, Err(AppError::BackendUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panic_payload_becomes_internal_error() {
        let err = panic_to_error(Box::new("boom"));
        assert!(matches!(err, AppError::Internal(ref d) if d == "boom"));
    }
}
