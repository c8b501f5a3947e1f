//! Retry executor.
//!
//! The executor runs an operation, consults [`RetryConfig::decide`] after
//! each failure, and sleeps through a [`Sleeper`] between attempts. Tests
//! inject a recording sleeper so attempt counts and backoff delays can be
//! asserted without real waits.

use crate::config::{RetryConfig, RetryDecision};
use crate::error::HasStatus;
use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Abstraction over the backoff sleep.
///
/// The sleep is a suspension point: dropping the future returned by
/// [`with_retry`] while it is sleeping aborts the retry loop, which is the
/// cancellation path for an in-progress backoff.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleep for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Tokio-backed sleeper used outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Execute an operation with retries, sleeping on the tokio timer.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: HasStatus + Display,
{
    with_retry_using(config, &TokioSleeper, operation).await
}

/// Execute an operation with retries using an explicit sleeper.
pub async fn with_retry_using<F, Fut, T, E>(
    config: &RetryConfig,
    sleeper: &dyn Sleeper,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: HasStatus + Display,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        debug!(
            attempt,
            max_attempts = config.max_attempts,
            "executing attempt"
        );

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => match config.decide(attempt, &error) {
                RetryDecision::Retry { delay } => {
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "waiting before retry"
                    );
                    sleeper.sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    warn!(
                        attempt,
                        error = %error,
                        "retry budget exhausted or error not retryable"
                    );
                    return Err(error);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryCondition;
    use crate::error::RetryableError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records requested delays instead of sleeping.
    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn config_503(max_attempts: u32) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(max_attempts)
            .full_jitter(Duration::from_millis(100), 4, Duration::from_secs(60))
            .retry_on(RetryCondition::new().on_status([503]))
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let sleeper = RecordingSleeper::default();
        let result = with_retry_using(&config_503(5), &sleeper, || async {
            Ok::<_, RetryableError>(42)
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_eventual_success_after_503s() {
        let sleeper = RecordingSleeper::default();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry_using(&config_503(5), &sleeper, || {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 4 {
                    Err(RetryableError::http(503, "Service Unavailable"))
                } else {
                    Ok("body")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "body");
        assert_eq!(attempts.load(Ordering::SeqCst), 5);

        // Delay before retry n comes from [0, 100ms * 4^n).
        let delays = sleeper.delays.lock().unwrap();
        assert_eq!(delays.len(), 4);
        for (i, delay) in delays.iter().enumerate() {
            let upper = Duration::from_millis(100 * 4u64.pow(i as u32 + 1));
            assert!(*delay < upper, "delay {:?} not below {:?}", delay, upper);
        }
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_last_error() {
        let sleeper = RecordingSleeper::default();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry_using(&config_503(5), &sleeper, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(RetryableError::http(503, "still down"))
            }
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        match result.unwrap_err() {
            RetryableError::Http { status, .. } => assert_eq!(status, 503),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_status_single_attempt() {
        let sleeper = RecordingSleeper::default();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry_using(&config_503(5), &sleeper, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(RetryableError::http(404, "not found"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connection_errors_not_retried() {
        let sleeper = RecordingSleeper::default();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry_using(&config_503(5), &sleeper, || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(RetryableError::connection("refused"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
