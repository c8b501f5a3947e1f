//! Endpoint descriptor for an IronMQ deployment.

use crate::error::{IronError, Result};
use url::Url;

/// An immutable endpoint: scheme, host, port, and an optional path prefix
/// for deployments mounted under a sub-path.
///
/// One well-known production endpoint exists ([`Cloud::aws_us_east`]);
/// anything else comes from configuration or an explicit override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cloud {
    scheme: String,
    host: String,
    port: u16,
    path_prefix: String,
}

impl Cloud {
    /// The primary production endpoint (AWS, us-east-1).
    pub fn aws_us_east() -> Self {
        Self::new("https", "mq-aws-us-east-1-1.iron.io", 443)
    }

    /// Build an endpoint from explicit parts.
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
            path_prefix: String::new(),
        }
    }

    /// Parse an endpoint from a full URL, e.g. `https://mq.example.com:8080/mq`.
    ///
    /// A missing port falls back to the scheme's default; a trailing slash on
    /// the path is dropped.
    pub fn from_url(raw: &str) -> Result<Self> {
        let url = Url::parse(raw)
            .map_err(|e| IronError::Configuration(format!("invalid endpoint URL {raw:?}: {e}")))?;

        let host = url
            .host_str()
            .ok_or_else(|| IronError::Configuration(format!("endpoint URL {raw:?} has no host")))?
            .to_string();

        let port = url.port_or_known_default().ok_or_else(|| {
            IronError::Configuration(format!("endpoint URL {raw:?} has no port"))
        })?;

        let path = url.path().trim_end_matches('/').to_string();

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port,
            path_prefix: path,
        })
    }

    /// Set the path prefix (no trailing slash).
    #[must_use]
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    /// URL scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path prefix, empty for top-level deployments.
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    /// Render the base URL, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme, self.host, self.port, self.path_prefix
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aws_us_east() {
        let cloud = Cloud::aws_us_east();
        assert_eq!(cloud.scheme(), "https");
        assert_eq!(cloud.host(), "mq-aws-us-east-1-1.iron.io");
        assert_eq!(cloud.port(), 443);
        assert_eq!(
            cloud.base_url(),
            "https://mq-aws-us-east-1-1.iron.io:443"
        );
    }

    #[test]
    fn test_from_url_full() {
        let cloud = Cloud::from_url("http://localhost:8080/mq/").unwrap();
        assert_eq!(cloud.scheme(), "http");
        assert_eq!(cloud.host(), "localhost");
        assert_eq!(cloud.port(), 8080);
        assert_eq!(cloud.path_prefix(), "/mq");
        assert_eq!(cloud.base_url(), "http://localhost:8080/mq");
    }

    #[test]
    fn test_from_url_default_port() {
        let cloud = Cloud::from_url("https://mq.example.com").unwrap();
        assert_eq!(cloud.port(), 443);
        assert_eq!(cloud.path_prefix(), "");
    }

    #[test]
    fn test_from_url_rejects_garbage() {
        assert!(Cloud::from_url("not a url").is_err());
    }
}
