//! Error types for the IronMQ client.

use thiserror::Error;

/// The main error type for IronMQ operations.
#[derive(Debug, Error)]
pub enum IronError {
    /// No usable credential or project could be resolved at construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The connection could not be established or failed mid-exchange.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    ///
    /// `message` is extracted from the JSON error body when the service
    /// sent one, otherwise it is a fixed placeholder.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code, verbatim from the response.
        status: u16,
        /// Human-readable message.
        message: String,
    },

    /// A message operation could not be carried out, because a required
    /// field (usually the id) is missing on the message in hand.
    #[error("message error: {0}")]
    Message(String),

    /// The queue had no message to hand out.
    ///
    /// This is a normal outcome of reserving or peeking on an empty queue,
    /// surfaced as a distinct kind so callers can branch on it without
    /// inspecting HTTP details.
    #[error("queue is empty")]
    QueueEmpty,

    /// A request or response body failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IronError {
    /// The HTTP status code, if this is an HTTP error.
    pub fn status(&self) -> Option<u16> {
        match self {
            IronError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl ironmq_retries::HasStatus for IronError {
    fn status(&self) -> Option<u16> {
        IronError::status(self)
    }
}

/// Result type alias using [`IronError`].
pub type Result<T> = std::result::Result<T, IronError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = IronError::Http {
            status: 404,
            message: "Queue not found".into(),
        };
        assert_eq!(err.to_string(), "HTTP 404: Queue not found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_queue_empty_display() {
        assert_eq!(IronError::QueueEmpty.to_string(), "queue is empty");
        assert_eq!(IronError::QueueEmpty.status(), None);
    }
}
