//! # ironmq-retries
//!
//! Retry strategies for the IronMQ Rust client.
//!
//! The IronMQ API fronts its service with a load balancer that answers
//! `503 Service Unavailable` while capacity is being added. That status is
//! the one transient signal worth retrying; everything else surfaces
//! immediately. This crate provides the pieces the client wires together:
//!
//! - **[`RetryConfig`]**: attempt budget, wait strategy, retry condition
//! - **[`WaitStrategy`]**: fixed delay or full-jitter exponential backoff
//! - **[`RetryCondition`]**: strict HTTP status allowlist
//! - **[`with_retry`]**: the executor loop
//! - **[`Sleeper`]**: injectable sleep, so tests assert delays without waiting
//!
//! ## Example
//!
//! ```ignore
//! use ironmq_retries::{with_retry, RetryCondition, RetryConfig, RetryableError};
//! use std::time::Duration;
//!
//! let config = RetryConfig::new()
//!     .max_attempts(5)
//!     .full_jitter(Duration::from_millis(100), 4, Duration::from_secs(60))
//!     .retry_on(RetryCondition::new().on_status([503]));
//!
//! let body = with_retry(&config, || async {
//!     // issue the HTTP request, mapping failures to RetryableError
//!     Ok::<_, RetryableError>("response body")
//! })
//! .await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod executor;

// Re-exports
pub use config::{RetryCondition, RetryConfig, RetryDecision, WaitStrategy};
pub use error::{HasStatus, RetryResult, RetryableError};
pub use executor::{with_retry, with_retry_using, Sleeper, TokioSleeper};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_decision_shape() {
        let config = RetryConfig::new()
            .max_attempts(2)
            .fixed(Duration::from_millis(5))
            .retry_on(RetryCondition::new().on_status([503]));

        let err = RetryableError::http(503, "");
        assert!(matches!(
            config.decide(1, &err),
            RetryDecision::Retry { .. }
        ));
        assert_eq!(config.decide(2, &err), RetryDecision::GiveUp);
    }
}
