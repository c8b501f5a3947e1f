//! Retry error types.

use thiserror::Error;

/// Exposes the HTTP status carried by an error, when there is one.
///
/// The retry condition is a status allowlist, so this is the only thing it
/// needs to know about an error type. Errors without a status (timeouts,
/// connection failures) report `None` and are never retried.
pub trait HasStatus {
    /// The HTTP status, if this error carries one.
    fn status(&self) -> Option<u16>;
}

/// Errors observed by the retry executor.
///
/// The executor never decides retryability from the error alone; the
/// [`RetryCondition`](crate::RetryCondition) attached to the config owns that
/// decision. This type only carries enough information (the HTTP status, when
/// there is one) for the condition to consult.
#[derive(Debug, Error)]
pub enum RetryableError {
    /// HTTP response with a non-success status code.
    #[error("HTTP error {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, or a message already extracted from it.
        body: String,
    },

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established.
    #[error("connection error: {0}")]
    Connection(String),

    /// Any other failure.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl RetryableError {
    /// Create an HTTP error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Get the HTTP status if this is an HTTP error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl HasStatus for RetryableError {
    fn status(&self) -> Option<u16> {
        RetryableError::status(self)
    }
}

/// Result type for retry operations.
pub type RetryResult<T> = Result<T, RetryableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        let err = RetryableError::http(503, "unavailable");
        assert_eq!(err.status(), Some(503));

        assert_eq!(RetryableError::Timeout.status(), None);
        assert_eq!(RetryableError::connection("refused").status(), None);
    }

    #[test]
    fn test_display() {
        let err = RetryableError::http(503, "Service Unavailable");
        assert_eq!(err.to_string(), "HTTP error 503: Service Unavailable");
    }
}
