//! Configuration types for the job registry client.

use crate::errors::{EjrError, EjrResult};
use std::time::Duration;
use url::Url;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default User-Agent header.
pub const DEFAULT_USER_AGENT: &str = "integrations-job-registry/0.1.0";

/// Default access-token lifetime when the grant response omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(300);

/// Retry configuration for update (PATCH) operations.
///
/// The registry can transiently answer 404 for a job right after its
/// creation, so updates get a small bounded retry budget. Create and read
/// operations are never retried.
#[derive(Debug, Clone)]
pub struct UpdateRetryConfig {
    /// Maximum total attempts for one logical update.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for UpdateRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(5),
        }
    }
}

/// Job registry client configuration.
#[derive(Debug, Clone)]
pub struct JobRegistryConfig {
    /// Registry API base URL.
    pub api_url: String,
    /// Identifier of the backend this client registers jobs for.
    pub backend_id: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// User-Agent header.
    pub user_agent: String,
    /// Retry configuration for update operations.
    pub update_retry: UpdateRetryConfig,
    /// Fallback access-token lifetime.
    pub default_token_lifetime: Duration,
}

impl JobRegistryConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> JobRegistryConfigBuilder {
        JobRegistryConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EjrResult<()> {
        if self.api_url.is_empty() {
            return Err(EjrError::Config("api_url is required".into()));
        }
        Url::parse(&self.api_url)
            .map_err(|e| EjrError::Config(format!("invalid api_url {:?}: {}", self.api_url, e)))?;
        if self.backend_id.is_empty() {
            return Err(EjrError::Config("backend_id is required".into()));
        }
        if self.update_retry.max_attempts == 0 {
            return Err(EjrError::Config(
                "update_retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`JobRegistryConfig`].
#[derive(Debug, Default)]
pub struct JobRegistryConfigBuilder {
    api_url: Option<String>,
    backend_id: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    update_retry: Option<UpdateRetryConfig>,
    default_token_lifetime: Option<Duration>,
}

impl JobRegistryConfigBuilder {
    /// Sets the registry API base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Sets the backend identifier.
    pub fn backend_id(mut self, id: impl Into<String>) -> Self {
        self.backend_id = Some(id.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the User-Agent header.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the update retry configuration.
    pub fn update_retry(mut self, retry: UpdateRetryConfig) -> Self {
        self.update_retry = Some(retry);
        self
    }

    /// Sets the fallback access-token lifetime.
    pub fn default_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_token_lifetime = Some(lifetime);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> EjrResult<JobRegistryConfig> {
        let config = JobRegistryConfig {
            api_url: self.api_url.unwrap_or_default(),
            backend_id: self.backend_id.unwrap_or_default(),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            update_retry: self.update_retry.unwrap_or_default(),
            default_token_lifetime: self.default_token_lifetime.unwrap_or(DEFAULT_TOKEN_LIFETIME),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = JobRegistryConfig::builder()
            .api_url("https://ejr.test")
            .backend_id("unittests")
            .build()
            .unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.update_retry.max_attempts, 2);
        assert_eq!(config.default_token_lifetime, DEFAULT_TOKEN_LIFETIME);
    }

    #[test]
    fn test_missing_api_url_rejected() {
        let result = JobRegistryConfig::builder().backend_id("b").build();
        assert!(matches!(result, Err(EjrError::Config(_))));
    }

    #[test]
    fn test_invalid_api_url_rejected() {
        let result = JobRegistryConfig::builder()
            .api_url("not a url")
            .backend_id("b")
            .build();
        assert!(matches!(result, Err(EjrError::Config(_))));
    }

    #[test]
    fn test_zero_retry_attempts_rejected() {
        let result = JobRegistryConfig::builder()
            .api_url("https://ejr.test")
            .backend_id("b")
            .update_retry(UpdateRetryConfig {
                max_attempts: 0,
                delay: Duration::from_secs(1),
            })
            .build();
        assert!(matches!(result, Err(EjrError::Config(_))));
    }
}
