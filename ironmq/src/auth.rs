//! Credential providers.
//!
//! A credential is either a static OAuth token or a Keystone identity that
//! logs in on demand and caches the issued token until it nears expiry.
//! Keystone's clocks and ours rarely agree, so expiry is computed against
//! the local clock: the offset between our receive time and the server's
//! `issued_at` is added to the server's `expires` timestamp.

use crate::config::KeystoneOptions;
use crate::error::{IronError, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

/// Safety margin: a token this close to expiry is refreshed early rather
/// than risked on a request that may outlive it.
const EXPIRY_MARGIN_SECS: i64 = 10;

/// Supplies the bearer token for the `Authorization` header.
#[derive(Debug)]
pub enum TokenProvider {
    /// Opaque token used as-is; no I/O, no expiry.
    Static(String),
    /// Keystone identity: logs in when the cached token is missing or stale.
    Keystone(KeystoneIdentity),
}

impl TokenProvider {
    /// Current token. May perform a login exchange for Keystone identities.
    pub async fn token(&self) -> Result<String> {
        match self {
            TokenProvider::Static(token) => Ok(token.clone()),
            TokenProvider::Keystone(identity) => identity.token().await,
        }
    }
}

/// A Keystone identity with a cached login token.
///
/// The cache sits behind an async mutex held across the login exchange, so
/// many callers racing a simultaneous expiry trigger exactly one login; the
/// rest wait and reuse its result.
#[derive(Debug)]
pub struct KeystoneIdentity {
    server: String,
    tenant: String,
    username: String,
    password: String,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl KeystoneIdentity {
    /// Build an identity from resolved configuration.
    pub fn new(options: KeystoneOptions, http: reqwest::Client) -> Self {
        Self {
            server: options.server,
            tenant: options.tenant,
            username: options.username,
            password: options.password,
            http,
            cached: Mutex::new(None),
        }
    }

    /// Return the cached token, logging in first if it is missing or about
    /// to expire. Login failures propagate; they are never retried here.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if !token.is_expired(Utc::now()) {
                return Ok(token.id.clone());
            }
        }

        debug!(server = %self.server, tenant = %self.tenant, "refreshing keystone token");
        let fresh = self.login().await?;
        let id = fresh.id.clone();
        *cached = Some(fresh);
        Ok(id)
    }

    async fn login(&self) -> Result<CachedToken> {
        let url = format!("{}/tokens", self.server.trim_end_matches('/'));
        let payload = TokenRequest {
            auth: Auth {
                tenant_name: &self.tenant,
                password_credentials: PasswordCredentials {
                    username: &self.username,
                    password: &self.password,
                },
            },
        };

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IronError::Http {
                status: status.as_u16(),
                message: if message.is_empty() {
                    "Empty or non-JSON response".to_string()
                } else {
                    message
                },
            });
        }

        let parsed: TokenResponse = response.json().await?;
        let token = parsed.access.token;
        Ok(CachedToken {
            id: token.id,
            local_issued_at: Utc::now(),
            issued_at: token.issued_at,
            expires_at: token.expires_at,
        })
    }
}

/// A token as issued, plus the local receive time for skew compensation.
#[derive(Debug, Clone)]
struct CachedToken {
    id: String,
    local_issued_at: DateTime<Utc>,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Local expiry = server expiry shifted by the observed clock offset,
    /// minus the safety margin.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let offset = self.local_issued_at - self.issued_at;
        let local_expiry = self.expires_at + offset;
        now >= local_expiry - Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    auth: Auth<'a>,
}

#[derive(Serialize)]
struct Auth<'a> {
    #[serde(rename = "tenantName")]
    tenant_name: &'a str,
    #[serde(rename = "passwordCredentials")]
    password_credentials: PasswordCredentials<'a>,
}

#[derive(Serialize)]
struct PasswordCredentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access: Access,
}

#[derive(Deserialize)]
struct Access {
    token: WireToken,
}

#[derive(Deserialize)]
struct WireToken {
    id: String,
    #[serde(deserialize_with = "keystone_time")]
    issued_at: DateTime<Utc>,
    #[serde(rename = "expires", deserialize_with = "keystone_time")]
    expires_at: DateTime<Utc>,
}

/// Keystone emits both RFC 3339 timestamps and zone-less variants like
/// `2013-07-09T10:18:50.000000`; the latter are taken as UTC.
fn keystone_time<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc())
        })
        .map_err(|e| serde::de::Error::custom(format!("bad keystone timestamp {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn token_at(issued: DateTime<Utc>, local: DateTime<Utc>, expires: DateTime<Utc>) -> CachedToken {
        CachedToken {
            id: "tok".into(),
            local_issued_at: local,
            issued_at: issued,
            expires_at: expires,
        }
    }

    #[test]
    fn test_fresh_token_not_expired() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let token = token_at(now, now, now + Duration::hours(1));
        assert!(!token.is_expired(now + Duration::minutes(30)));
    }

    #[test]
    fn test_token_expired_within_margin() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let token = token_at(now, now, now + Duration::hours(1));
        // 5 seconds before nominal expiry is inside the 10 second margin.
        assert!(token.is_expired(now + Duration::hours(1) - Duration::seconds(5)));
    }

    #[test]
    fn test_expiry_shifts_with_clock_skew() {
        // Server clock runs 10 minutes ahead of ours: a token issued "now"
        // server-side carries issued_at in our future, and its expiry must
        // shift back by the same offset.
        let local = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let server_issued = local + Duration::minutes(10);
        let server_expires = server_issued + Duration::hours(1);
        let token = token_at(server_issued, local, server_expires);

        assert!(!token.is_expired(local + Duration::minutes(55)));
        assert!(token.is_expired(local + Duration::hours(1)));
    }

    #[test]
    fn test_login_payload_shape() {
        let payload = TokenRequest {
            auth: Auth {
                tenant_name: "acme",
                password_credentials: PasswordCredentials {
                    username: "worker",
                    password: "hunter2",
                },
            },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "auth": {
                    "tenantName": "acme",
                    "passwordCredentials": {
                        "username": "worker",
                        "password": "hunter2"
                    }
                }
            })
        );
    }

    #[test]
    fn test_token_response_parsing() {
        let body = r#"{
            "access": {
                "token": {
                    "id": "abc123",
                    "issued_at": "2026-01-01T12:00:00.000000",
                    "expires": "2026-01-01T13:00:00Z"
                }
            }
        }"#;
        let parsed: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.access.token.id, "abc123");
        assert_eq!(
            parsed.access.token.expires_at,
            Utc.with_ymd_and_hms(2026, 1, 1, 13, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_static_provider_no_io() {
        let provider = TokenProvider::Static("tok".into());
        assert_eq!(provider.token().await.unwrap(), "tok");
    }
}
