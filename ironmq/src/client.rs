//! The IronMQ client.
//!
//! [`ClientBuilder`] runs configuration resolution once, at construction;
//! the resulting [`Client`] is an immutable bundle of endpoint, identity,
//! and retry policy that every request goes through. Resource wrappers
//! ([`Queue`]) hold a reference to the client and translate typed calls
//! into [`Client::request`].

use crate::auth::{KeystoneIdentity, TokenProvider};
use crate::cloud::Cloud;
use crate::config::{ConfigOptions, KeystoneOptions, Resolver, DEFAULT_API_VERSION};
use crate::error::{IronError, Result};
use crate::queue::Queue;
use crate::types::{QueueModel, QueuesContainer};
use ironmq_retries::{
    with_retry_using, RetryCondition, RetryConfig, Sleeper, TokioSleeper,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Total attempts per request, first try included.
pub const MAX_ATTEMPTS: u32 = 5;
/// Base of the backoff window; the delay before retry `n` is drawn from
/// `[0, BACKOFF_BASE * BACKOFF_FACTOR^n)`.
pub const BACKOFF_BASE: Duration = Duration::from_millis(100);
/// Growth factor of the backoff window per attempt.
pub const BACKOFF_FACTOR: u32 = 4;

const BACKOFF_MAX: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// The service's verb for DELETE and PATCH, which some proxies refuse.
const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

/// Fallback message when an error body is valid JSON without a usable `msg`.
const INVALID_JSON_MESSAGE: &str = "IronMQ's response contained invalid JSON";
/// Fallback message when an error body is empty or not JSON at all.
const EMPTY_RESPONSE_MESSAGE: &str = "Empty or non-JSON response";

/// Builder for [`Client`].
///
/// Every setter is optional; anything left unset is resolved through
/// environment variables, configuration files, and finally defaults.
#[derive(Default)]
pub struct ClientBuilder {
    options: ConfigOptions,
    cloud: Option<Cloud>,
    api_version: Option<String>,
    lookup_depth: u32,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl ClientBuilder {
    /// Start with everything unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Project identifier.
    #[must_use]
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.options.project_id = Some(project_id.into());
        self
    }

    /// Static OAuth token.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.options.token = Some(token.into());
        self
    }

    /// Keystone identity; used when no static token resolves.
    #[must_use]
    pub fn keystone(mut self, keystone: KeystoneOptions) -> Self {
        self.options.keystone = Some(keystone);
        self
    }

    /// Endpoint override. Wins over any scheme/host/port from other sources.
    #[must_use]
    pub fn cloud(mut self, cloud: Cloud) -> Self {
        self.cloud = Some(cloud);
        self
    }

    /// Environment name, e.g. `production`; selects config file variants
    /// and nested sections.
    #[must_use]
    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.options.env = Some(env.into());
        self
    }

    /// Load this config file in addition to the standard scan.
    #[must_use]
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.config = Some(path.into());
        self
    }

    /// API version segment of request URLs. Defaults to `3`.
    #[must_use]
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// How many ancestor directories of the working directory take part in
    /// the config file scan. Defaults to 0 (the working directory only).
    #[must_use]
    pub fn lookup_depth(mut self, depth: u32) -> Self {
        self.lookup_depth = depth;
        self
    }

    /// TCP connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Whole-request timeout, applied per attempt.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Replace the backoff sleeper. Delays between attempts grow to tens of
    /// seconds, so tests swap in a sleeper that does not wait.
    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Resolve configuration and construct the client.
    ///
    /// Fails with [`IronError::Configuration`] when no project id resolves,
    /// or when neither a token nor a complete Keystone identity does.
    pub fn build(self) -> Result<Client> {
        let resolver = Resolver::from_process(self.lookup_depth)?;
        let options = resolver.resolve(self.options);

        let cloud = match self.cloud {
            Some(cloud) => cloud,
            // Resolution always fills scheme/host/port from defaults.
            None => Cloud::new(
                options.scheme.unwrap_or_default(),
                options.host.unwrap_or_default(),
                options.port.unwrap_or(443),
            ),
        };

        let project_id = options
            .project_id
            .ok_or_else(|| IronError::Configuration("no project_id resolved".into()))?;

        let user_agent = options
            .user_agent
            .unwrap_or_else(|| crate::config::DEFAULT_USER_AGENT.to_string());

        let http = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
            .timeout(self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .build()?;

        let tokens = match (options.token, options.keystone) {
            (Some(token), _) => TokenProvider::Static(token),
            (None, Some(ks)) if ks.is_complete() => {
                TokenProvider::Keystone(KeystoneIdentity::new(ks, http.clone()))
            }
            _ => {
                return Err(IronError::Configuration(
                    "no token or complete keystone identity resolved".into(),
                ))
            }
        };

        let retry = RetryConfig::new()
            .max_attempts(MAX_ATTEMPTS)
            .full_jitter(BACKOFF_BASE, BACKOFF_FACTOR, BACKOFF_MAX)
            .retry_on(RetryCondition::new().on_status([503]));

        Ok(Client {
            cloud,
            project_id,
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            user_agent,
            env: options.env,
            http,
            tokens,
            retry,
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
        })
    }
}

/// An IronMQ API client.
///
/// Cheap to share behind a reference; all state set at construction is
/// immutable, and the token cache synchronizes internally.
pub struct Client {
    cloud: Cloud,
    project_id: String,
    api_version: String,
    user_agent: String,
    env: Option<String>,
    http: reqwest::Client,
    tokens: TokenProvider,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl Client {
    /// Shorthand for the common case: explicit project id and token, all
    /// other settings resolved as usual.
    pub fn new(project_id: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        ClientBuilder::new()
            .project_id(project_id)
            .token(token)
            .build()
    }

    /// Start building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The resolved project id.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// The endpoint this client talks to.
    pub fn cloud(&self) -> &Cloud {
        &self.cloud
    }

    /// The resolved environment name, if any.
    pub fn env(&self) -> Option<&str> {
        self.env.as_deref()
    }

    /// A handle to the named queue. No I/O happens until an operation is
    /// called on it.
    pub fn queue(&self, name: impl Into<String>) -> Queue<'_> {
        Queue::new(self, name)
    }

    /// List queues, first page with service defaults.
    pub async fn queues(&self) -> Result<Vec<QueueModel>> {
        self.queues_page(None, None).await
    }

    /// List queues in lexicographic order. `previous` is the last name of
    /// the prior page; names at or before it are skipped.
    pub async fn queues_page(
        &self,
        previous: Option<&str>,
        per_page: Option<u32>,
    ) -> Result<Vec<QueueModel>> {
        let mut query = Vec::new();
        if let Some(previous) = previous {
            query.push(format!("previous={previous}"));
        }
        if let Some(per_page) = per_page {
            query.push(format!("per_page={per_page}"));
        }
        let path = if query.is_empty() {
            "queues".to_string()
        } else {
            format!("queues?{}", query.join("&"))
        };
        let body = self.get(&path).await?;
        let container: QueuesContainer = serde_json::from_str(&body)?;
        Ok(container.queues)
    }

    /// Issue one API request and return the raw response body.
    ///
    /// The path is relative to the project root, e.g. `queues/foo/messages`.
    /// 503 responses are retried with full-jitter backoff up to
    /// [`MAX_ATTEMPTS`] total attempts; every other failure surfaces after
    /// the first attempt.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String> {
        let url = self.url_for(path);
        debug!(method = %method, url = %url, "api request");

        with_retry_using(&self.retry, self.sleeper.as_ref(), || {
            let method = method.clone();
            let url = &url;
            async move { self.attempt(method, url, body).await }
        })
        .await
    }

    /// Absolute URL for a project-relative path.
    pub(crate) fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}/projects/{}/{}",
            self.cloud.base_url(),
            self.api_version,
            self.project_id,
            path
        )
    }

    /// Current bearer token; may trigger a Keystone login.
    pub(crate) async fn auth_token(&self) -> Result<String> {
        self.tokens.token().await
    }

    /// One attempt: fetch a token, send, classify the response.
    async fn attempt(&self, method: Method, url: &str, body: Option<&Value>) -> Result<String> {
        let token = self.tokens.token().await?;

        // DELETE and PATCH go over the wire as POST with the real verb in
        // an override header; some proxies drop them otherwise.
        let (wire_method, override_verb) = if method == Method::DELETE || method == Method::PATCH {
            (Method::POST, Some(method))
        } else {
            (method, None)
        };

        let mut request = self
            .http
            .request(wire_method, url)
            .header(AUTHORIZATION, format!("OAuth {token}"))
            .header(USER_AGENT, &self.user_agent);
        if let Some(verb) = override_verb {
            request = request.header(METHOD_OVERRIDE_HEADER, verb.as_str());
        }
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.text().await?);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await.unwrap_or_default();
        Err(classify(status.as_u16(), &content_type, &body))
    }

    pub(crate) async fn get(&self, path: &str) -> Result<String> {
        self.request(Method::GET, path, None).await
    }

    pub(crate) async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<String> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(&body)).await
    }

    pub(crate) async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<String> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(&body)).await
    }

    pub(crate) async fn patch<B: Serialize>(&self, path: &str, body: &B) -> Result<String> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PATCH, path, Some(&body)).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<String> {
        self.request(Method::DELETE, path, None).await
    }

    pub(crate) async fn delete_with_body<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<String> {
        let body = serde_json::to_value(body)?;
        self.request(Method::DELETE, path, Some(&body)).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.get(path).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Turn a non-success response into an [`IronError::Http`].
///
/// The service reports errors as `{"msg": "..."}`. That message is used
/// verbatim when present; otherwise one of two fixed fallbacks stands in,
/// depending on whether the body claimed to be JSON.
fn classify(status: u16, content_type: &str, body: &str) -> IronError {
    let message = if !body.is_empty() && content_type.starts_with("application/json") {
        match serde_json::from_str::<Value>(body) {
            Ok(parsed) => match parsed.get("msg").and_then(Value::as_str) {
                Some(msg) => msg.to_string(),
                None => INVALID_JSON_MESSAGE.to_string(),
            },
            Err(_) => INVALID_JSON_MESSAGE.to_string(),
        }
    } else {
        EMPTY_RESPONSE_MESSAGE.to_string()
    };
    IronError::Http { status, message }
}
