//! Retry with exponential backoff.
//!
//! ```rust,ignore
//! use echoes_etymology::retry::{RetryPolicy, with_retry};
//!
//! let policy = RetryPolicy::default();
//! let text = with_retry(&policy, || async { client.complete(request.clone()).await }).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{EtymologyError, Result};

/// Configuration for retry behavior with exponential backoff.
///
/// The delay after the n-th failed attempt is `multiplier * 2^(n-1)` seconds,
/// clamped to `[min_delay, max_delay]`. There is no jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Floor for the delay between attempts.
    pub min_delay: Duration,
    /// Ceiling for the delay between attempts.
    pub max_delay: Duration,
    /// Base of the exponential curve, in seconds.
    pub multiplier: f64,
    /// Decides whether a failure is worth another attempt.
    pub retryable: fn(&EtymologyError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2), Duration::from_secs(10))
    }
}

impl RetryPolicy {
    /// Create a policy retrying transient errors.
    #[must_use]
    pub fn new(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_delay,
            max_delay: max_delay.max(min_delay),
            multiplier: 1.0,
            retryable: EtymologyError::is_transient,
        }
    }

    /// Policy that retries without waiting.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Replace the retryable-error predicate.
    #[must_use]
    pub fn with_predicate(mut self, retryable: fn(&EtymologyError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Delay to wait after `failed_attempts` consecutive failures (1-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, failed_attempts: u32) -> Duration {
        let exp = failed_attempts.saturating_sub(1).min(31) as i32;
        let secs = self.multiplier.max(0.0) * 2f64.powi(exp);
        Duration::from_secs_f64(secs).clamp(self.min_delay, self.max_delay)
    }
}

/// Execute an async operation with retry and exponential backoff.
///
/// Non-retryable errors return immediately. Once attempts are exhausted the
/// last error is returned unchanged.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("Operation succeeded after {attempt} retries");
                }
                return Ok(value);
            }
            Err(e) => {
                attempt += 1;

                if !(policy.retryable)(&e) {
                    return Err(e);
                }

                if attempt >= policy.max_attempts {
                    warn!(
                        "Operation failed after {attempt}/{} attempts: {e}",
                        policy.max_attempts
                    );
                    return Err(e);
                }

                let delay = policy.delay_for_attempt(attempt);
                debug!(
                    "Retrying after failure (attempt {attempt}, waiting {}ms): {e}",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_is_clamped_between_bounds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);

        let result = with_retry(&policy, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(EtymologyError::Upstream("502".to_string()))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_last_error_is_returned_after_exhaustion() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);

        let result: Result<()> = with_retry(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EtymologyError::Timeout(Duration::from_secs(60)))
        })
        .await;

        assert!(matches!(result, Err(EtymologyError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);

        let result: Result<()> = with_retry(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EtymologyError::MalformedResponse("not json".to_string()))
        })
        .await;

        assert!(matches!(result, Err(EtymologyError::MalformedResponse(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_predicate() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(4).with_predicate(|_| false);

        let _ = with_retry(&policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(EtymologyError::Upstream("503".to_string()))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
