//! Retry configuration and wait strategies.

use crate::error::HasStatus;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Wait strategy between attempts.
    pub wait: WaitStrategy,
    /// Which errors are worth retrying.
    pub retry_on: RetryCondition,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait: WaitStrategy::FullJitter {
                base: Duration::from_millis(100),
                factor: 2,
                max: Duration::from_secs(60),
            },
            retry_on: RetryCondition::default(),
        }
    }
}

impl RetryConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total attempt budget (first attempt included).
    #[must_use]
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Set the wait strategy.
    #[must_use]
    pub fn wait(mut self, strategy: WaitStrategy) -> Self {
        self.wait = strategy;
        self
    }

    /// Use a fixed delay between attempts.
    #[must_use]
    pub fn fixed(mut self, delay: Duration) -> Self {
        self.wait = WaitStrategy::Fixed(delay);
        self
    }

    /// Use full-jitter exponential backoff: the delay before retry `n` is
    /// drawn uniformly from `[0, base * factor^n)`, capped at `max`.
    #[must_use]
    pub fn full_jitter(mut self, base: Duration, factor: u32, max: Duration) -> Self {
        self.wait = WaitStrategy::FullJitter { base, factor, max };
        self
    }

    /// Set the retry condition.
    #[must_use]
    pub fn retry_on(mut self, condition: RetryCondition) -> Self {
        self.retry_on = condition;
        self
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self::new().max_attempts(1)
    }

    /// Decide what to do after attempt number `attempt` (1-indexed) failed
    /// with `error`.
    pub fn decide<E: HasStatus>(&self, attempt: u32, error: &E) -> RetryDecision {
        if attempt >= self.max_attempts || !self.retry_on.should_retry(error) {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            delay: self.wait.calculate(attempt),
        }
    }
}

/// Outcome of consulting the retry policy after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait for `delay`, then run the next attempt.
    Retry {
        /// Backoff delay before the next attempt.
        delay: Duration,
    },
    /// Surface the error to the caller.
    GiveUp,
}

/// Strategy for waiting between attempts.
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// No waiting.
    None,
    /// Fixed delay.
    Fixed(Duration),
    /// Exponential backoff with full jitter: delay for attempt `n` is drawn
    /// uniformly at random from `[0, base * factor^n)`, capped at `max`.
    /// Randomizing over the whole window keeps a fleet of clients from
    /// retrying in lockstep.
    FullJitter {
        /// Base delay, multiplied by `factor^n`.
        base: Duration,
        /// Growth factor per attempt.
        factor: u32,
        /// Upper cap on the drawn delay.
        max: Duration,
    },
}

impl WaitStrategy {
    /// Calculate the wait before the retry that follows attempt `attempt`
    /// (1-indexed).
    pub fn calculate(&self, attempt: u32) -> Duration {
        match self {
            WaitStrategy::None => Duration::ZERO,
            WaitStrategy::Fixed(d) => *d,
            WaitStrategy::FullJitter { base, factor, max } => {
                let upper = base
                    .saturating_mul(factor.saturating_pow(attempt))
                    .min(*max);
                let upper_ms = upper.as_millis() as u64;
                if upper_ms == 0 {
                    return Duration::ZERO;
                }
                use rand::Rng;
                let mut rng = rand::thread_rng();
                Duration::from_millis(rng.gen_range(0..upper_ms))
            }
        }
    }

    /// The largest delay this strategy can produce for a given attempt.
    pub fn upper_bound(&self, attempt: u32) -> Duration {
        match self {
            WaitStrategy::None => Duration::ZERO,
            WaitStrategy::Fixed(d) => *d,
            WaitStrategy::FullJitter { base, factor, max } => base
                .saturating_mul(factor.saturating_pow(attempt))
                .min(*max),
        }
    }
}

/// Condition for retrying: a strict allowlist of HTTP status codes.
///
/// Errors without a status (timeouts, connection failures) are never
/// retried; they indicate conditions a blind retry is unlikely to fix and
/// the caller should see immediately.
#[derive(Debug, Clone, Default)]
pub struct RetryCondition {
    /// HTTP status codes to retry on.
    pub on_status_codes: Vec<u16>,
}

impl RetryCondition {
    /// Create a new empty condition (retries nothing).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add status codes to retry on.
    #[must_use]
    pub fn on_status(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.on_status_codes.extend(codes);
        self
    }

    /// Check whether an error should be retried.
    pub fn should_retry<E: HasStatus>(&self, error: &E) -> bool {
        match error.status() {
            Some(status) => self.on_status_codes.contains(&status),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetryableError;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_config_builder() {
        let config = RetryConfig::new()
            .max_attempts(5)
            .fixed(Duration::from_secs(1));
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn test_max_attempts_floor() {
        // A zero budget would never run the operation at all.
        let config = RetryConfig::new().max_attempts(0);
        assert_eq!(config.max_attempts, 1);
    }

    #[test]
    fn test_wait_strategy_fixed() {
        let strategy = WaitStrategy::Fixed(Duration::from_secs(1));
        assert_eq!(strategy.calculate(1), Duration::from_secs(1));
        assert_eq!(strategy.calculate(3), Duration::from_secs(1));
    }

    #[rstest]
    #[case(1, 400)]
    #[case(2, 1_600)]
    #[case(3, 6_400)]
    #[case(4, 25_600)]
    fn test_full_jitter_stays_in_window(#[case] attempt: u32, #[case] upper_ms: u64) {
        let strategy = WaitStrategy::FullJitter {
            base: Duration::from_millis(100),
            factor: 4,
            max: Duration::from_secs(60),
        };

        let upper = Duration::from_millis(upper_ms);
        assert_eq!(strategy.upper_bound(attempt), upper);
        for _ in 0..50 {
            assert!(strategy.calculate(attempt) < upper);
        }
    }

    #[test]
    fn test_full_jitter_cap() {
        let strategy = WaitStrategy::FullJitter {
            base: Duration::from_secs(1),
            factor: 10,
            max: Duration::from_secs(5),
        };
        assert_eq!(strategy.upper_bound(6), Duration::from_secs(5));
        assert!(strategy.calculate(6) < Duration::from_secs(5));
    }

    #[test]
    fn test_retry_condition_allowlist() {
        let condition = RetryCondition::new().on_status([503]);

        assert!(condition.should_retry(&RetryableError::http(503, "")));
        assert!(!condition.should_retry(&RetryableError::http(500, "")));
        assert!(!condition.should_retry(&RetryableError::http(404, "")));
        assert!(!condition.should_retry(&RetryableError::Timeout));
        assert!(!condition.should_retry(&RetryableError::connection("refused")));
    }

    #[test]
    fn test_decide_retry_then_give_up() {
        let config = RetryConfig::new()
            .max_attempts(3)
            .fixed(Duration::from_millis(10))
            .retry_on(RetryCondition::new().on_status([503]));

        let err = RetryableError::http(503, "unavailable");
        assert_eq!(
            config.decide(1, &err),
            RetryDecision::Retry {
                delay: Duration::from_millis(10)
            }
        );
        assert_eq!(
            config.decide(2, &err),
            RetryDecision::Retry {
                delay: Duration::from_millis(10)
            }
        );
        assert_eq!(config.decide(3, &err), RetryDecision::GiveUp);
    }

    #[test]
    fn test_decide_non_retryable() {
        let config = RetryConfig::new()
            .max_attempts(5)
            .retry_on(RetryCondition::new().on_status([503]));

        assert_eq!(
            config.decide(1, &RetryableError::http(500, "boom")),
            RetryDecision::GiveUp
        );
        assert_eq!(
            config.decide(1, &RetryableError::Timeout),
            RetryDecision::GiveUp
        );
    }
}
