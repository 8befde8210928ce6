//! Bounded retry with exponential backoff for browser actions.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::browser::backend::BrowserError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);
pub const DEFAULT_JITTER: f64 = 0.25;
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total tries per action, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Up to this fraction of the delay is added at random. Never subtracted.
    pub jitter: f64,
    /// Bound on one try; exceeding it counts as a transient timeout.
    pub op_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BACKOFF_BASE,
            jitter: DEFAULT_JITTER,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed try number `failed_try` (1-based):
    /// base, 2 × base, 4 × base... plus jitter.
    pub fn backoff(&self, failed_try: u32) -> Duration {
        let exponent = failed_try.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1 << exponent);
        if self.jitter <= 0.0 {
            return delay;
        }
        let extra = rand::rng().random_range(0.0..=self.jitter);
        delay + delay.mul_f64(extra)
    }
}

/// How a retried action ended when it did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryFailure {
    /// Non-transient error; returned on the try that produced it.
    Permanent(BrowserError),
    /// Transient errors on every try.
    Exhausted { attempts: u32, last: BrowserError },
}

/// Runs `op` until it succeeds, fails permanently or uses up `policy.max_attempts`.
/// Each try is bounded by `policy.op_timeout`.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    action: &str,
    mut op: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BrowserError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = match tokio::time::timeout(policy.op_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::Timeout(format!(
                "{action} took longer than {}s",
                policy.op_timeout.as_secs()
            ))),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(RetryFailure::Permanent(e)),
            Err(e) if attempt >= max_attempts => {
                return Err(RetryFailure::Exhausted {
                    attempts: attempt,
                    last: e,
                })
            }
            Err(e) => {
                let delay = policy.backoff(attempt);
                warn!(
                    "{action} attempt {attempt}/{max_attempts} failed ({e}), retrying after {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;

    #[test]
    fn test_backoff_doubles_without_jitter() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..Default::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn test_jitter_never_shortens_delay() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.backoff(2);
            assert!(delay >= Duration::from_secs(4));
            assert!(delay <= Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retry_until_success() {
        let tries = &AtomicU32::new(0);
        let started = Instant::now();
        let result = run_with_retry(&RetryPolicy::default(), "navigate", move || async move {
            if tries.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(BrowserError::StaleElement)
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(tries.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let tries = &AtomicU32::new(0);
        let result: Result<(), _> = run_with_retry(&RetryPolicy::default(), "open", move || async move {
            tries.fetch_add(1, Ordering::SeqCst);
            Err(BrowserError::AuthRequired("sign in to apply".to_string()))
        })
        .await;

        assert!(matches!(result, Err(RetryFailure::Permanent(BrowserError::AuthRequired(_)))));
        assert_eq!(tries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_operation_times_out_and_exhausts() {
        let tries = &AtomicU32::new(0);
        let started = Instant::now();
        let result: Result<(), _> = run_with_retry(&RetryPolicy::default(), "submit", move || async move {
            tries.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<Result<(), BrowserError>>().await
        })
        .await;

        match result {
            Err(RetryFailure::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(last, BrowserError::Timeout(_)));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(tries.load(Ordering::SeqCst), 3);
        // three 30s timeouts plus at least 2s and 4s of backoff
        assert!(started.elapsed() >= Duration::from_secs(96));
    }
}
