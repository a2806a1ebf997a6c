//! Client configuration.

use std::time::Duration;

use url::Url;

use crate::error::Result;
use crate::retry::RetryPolicy;

/// Backend base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// API client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy for idempotent reads.
    pub retry: RetryPolicy,
    /// User-Agent header value.
    pub user_agent: String,
}

impl ClientConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(base_url)
    }

    /// Builds the full URL for an endpoint path such as `/emails`.
    ///
    /// The path is appended to the base URL's own path, so a base of
    /// `http://host/api` yields `http://host/api/emails`.
    ///
    /// # Errors
    ///
    /// Returns a client-kind error if the result is not a valid URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    user_agent: String,
}

impl ClientConfigBuilder {
    /// Creates a new builder with the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            user_agent: concat!("autoreply/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy for idempotent reads.
    #[must_use]
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the User-Agent header.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns a client-kind error if the base URL does not parse.
    pub fn build(self) -> Result<ClientConfig> {
        Ok(ClientConfig {
            base_url: Url::parse(&self.base_url)?,
            timeout: self.timeout,
            retry: self.retry,
            user_agent: self.user_agent,
        })
    }
}
