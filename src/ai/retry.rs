//! Retry with exponential backoff for remote AI calls.
//!
//! Only transient failures (network errors, rate limits, server-side HTTP
//! statuses) are retried; a permanent failure such as an unparseable model
//! reply returns immediately instead of burning quota on a deterministic
//! error. Classification lives in [`LydtagError::is_transient`].

use crate::error::Result;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt ceiling and backoff bounds for one class of remote call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
        }
    }

    /// A policy with no delays, for tests.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }
}

/// Run `operation` until it succeeds, fails permanently, or exhausts the
/// policy's attempt ceiling. The delay doubles after each transient failure,
/// capped at `max_delay`.
pub async fn with_backoff<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    "Transient failure, will retry after backoff: {}",
                    err
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2).min(policy.max_delay);
            }
            Err(err) => {
                if err.is_transient() {
                    warn!(
                        operation = operation_name,
                        attempt, "Giving up after exhausting retries: {}", err
                    );
                } else {
                    debug!(
                        operation = operation_name,
                        attempt, "Permanent failure, not retrying: {}", err
                    );
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LydtagError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient_err() -> LydtagError {
        LydtagError::AiStatus {
            status: 503,
            message: "overloaded".to_string(),
        }
    }

    fn permanent_err() -> LydtagError {
        LydtagError::AiResponse("not json".to_string())
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let result = with_backoff("op", &RetryPolicy::immediate(5), || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_transient_retried_until_success() {
        let attempts = AtomicU32::new(0);

        let result = with_backoff("op", &RetryPolicy::immediate(5), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(transient_err())
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transient_exhausts_attempt_ceiling() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = with_backoff("op", &RetryPolicy::immediate(3), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(transient_err()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_fails_immediately() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = with_backoff("op", &RetryPolicy::immediate(5), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(permanent_err()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
