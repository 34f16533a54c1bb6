//! Job registry API client implementation.

use crate::auth::{JobRegistryCredentials, OidcClientCredentialsAuth, TokenCache};
use crate::config::{JobRegistryConfig, JobRegistryConfigBuilder, UpdateRetryConfig};
use crate::errors::{EjrError, EjrHttpError, EjrResult};
use crate::observability::Metrics;
use crate::resilience::UpdateRetry;
use crate::types::{format_timestamp, DependencyStatus, JobRecord, JobStatus, JobUpdate};
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Client for the Elastic Job Registry (EJR) API.
///
/// Exposes the job lifecycle operations (create, search, partial field
/// updates) against the remote registry, obtaining bearer tokens through
/// the client-credentials grant and applying the bounded retry policy to
/// update operations.
pub struct JobRegistryClient {
    /// HTTP client.
    http: Client,
    /// Configuration.
    config: JobRegistryConfig,
    /// Client-credentials authenticator, when configured.
    auth: Option<OidcClientCredentialsAuth>,
    /// Retry policy for update operations.
    retry: UpdateRetry,
    /// Request counters.
    metrics: Arc<Metrics>,
}

impl JobRegistryClient {
    /// Creates a new client without authentication.
    ///
    /// Only `health_check(false)` is usable until credentials are
    /// supplied via [`JobRegistryClientBuilder::credentials`].
    pub fn new(config: JobRegistryConfig) -> EjrResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| EjrError::Config(format!("failed to create HTTP client: {}", e)))?;

        let retry = UpdateRetry::new(&config.update_retry);

        Ok(Self {
            http,
            config,
            auth: None,
            retry,
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Creates a new client builder.
    pub fn builder() -> JobRegistryClientBuilder {
        JobRegistryClientBuilder::new()
    }

    /// Gets the registry base URL.
    pub fn base_url(&self) -> &str {
        &self.config.api_url
    }

    /// Gets the backend identifier this client registers jobs for.
    pub fn backend_id(&self) -> &str {
        &self.config.backend_id
    }

    /// Gets the request counters.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    // Operations

    /// Probes the registry health endpoint.
    ///
    /// With `use_auth` false the Authorization header is omitted entirely,
    /// probing unauthenticated reachability. The health payload is
    /// returned unmodified. No retry.
    pub async fn health_check(&self, use_auth: bool) -> EjrResult<Value> {
        self.request_json(Method::GET, "/health", Option::<&()>::None, use_auth)
            .await
    }

    /// Registers a new job and returns the record acknowledged by the server.
    ///
    /// Generates a fresh job id, stamps `created == updated == now` and
    /// `status = created`. Never retried: a failed create must not
    /// silently duplicate job ids.
    pub async fn create_job(
        &self,
        process: Value,
        user_id: &str,
        job_options: Option<Value>,
    ) -> EjrResult<JobRecord> {
        let now = format_timestamp(&Utc::now());
        let record = JobRecord {
            backend_id: self.config.backend_id.clone(),
            job_id: generate_job_id(),
            user_id: user_id.to_string(),
            process,
            created: now.clone(),
            updated: now,
            status: JobStatus::Created,
            job_options,
            started: None,
            finished: None,
            dependencies: None,
            dependency_status: None,
            proxy_user: None,
            application_id: None,
            extra: Default::default(),
        };
        tracing::info!(job_id = %record.job_id, user_id = %record.user_id, "creating job");
        self.request_json(Method::POST, "/jobs", Some(&record), true)
            .await
    }

    /// Lists all jobs of one user, exactly as returned by the registry.
    pub async fn list_user_jobs(&self, user_id: &str) -> EjrResult<Vec<Value>> {
        self.search(json!({ "user_id": user_id })).await
    }

    /// Lists this backend's jobs in non-terminal states, exactly as
    /// returned by the registry.
    pub async fn list_active_jobs(&self) -> EjrResult<Vec<Value>> {
        let active: Vec<&str> = JobStatus::active().iter().map(JobStatus::as_str).collect();
        self.search(json!({
            "backend_id": self.config.backend_id,
            "status": { "$in": active },
        }))
        .await
    }

    /// Updates a job's status, always stamping `updated`.
    ///
    /// `started` and `finished` are included only when supplied, each
    /// normalized to the canonical timestamp format; `updated` defaults to
    /// the current time. Subject to the update retry policy.
    pub async fn set_status(
        &self,
        job_id: &str,
        status: JobStatus,
        updated: Option<DateTime<Utc>>,
        started: Option<DateTime<Utc>>,
        finished: Option<DateTime<Utc>>,
    ) -> EjrResult<Value> {
        let update = JobUpdate {
            status: Some(status),
            updated: Some(format_timestamp(&updated.unwrap_or_else(Utc::now))),
            started: started.as_ref().map(format_timestamp),
            finished: finished.as_ref().map(format_timestamp),
            ..Default::default()
        };
        self.update(job_id, &update).await
    }

    /// Sets a job's dependency descriptors.
    pub async fn set_dependencies(
        &self,
        job_id: &str,
        dependencies: Vec<Value>,
    ) -> EjrResult<Value> {
        let update = JobUpdate {
            dependencies: Some(Value::Array(dependencies)),
            ..Default::default()
        };
        self.update(job_id, &update).await
    }

    /// Clears a job's dependencies and dependency status.
    ///
    /// Both fields are sent as explicit `null`: the registry distinguishes
    /// an omitted field (left untouched) from a null one (cleared).
    pub async fn remove_dependencies(&self, job_id: &str) -> EjrResult<Value> {
        let update = JobUpdate {
            dependencies: Some(Value::Null),
            dependency_status: Some(Value::Null),
            ..Default::default()
        };
        self.update(job_id, &update).await
    }

    /// Sets a job's dependency status.
    pub async fn set_dependency_status(
        &self,
        job_id: &str,
        dependency_status: DependencyStatus,
    ) -> EjrResult<Value> {
        let update = JobUpdate {
            dependency_status: Some(Value::String(dependency_status.as_str().to_string())),
            ..Default::default()
        };
        self.update(job_id, &update).await
    }

    /// Sets the user a job is executed on behalf of.
    pub async fn set_proxy_user(&self, job_id: &str, proxy_user: &str) -> EjrResult<Value> {
        let update = JobUpdate {
            proxy_user: Some(proxy_user.to_string()),
            ..Default::default()
        };
        self.update(job_id, &update).await
    }

    /// Sets the identifier of a job's execution application.
    pub async fn set_application_id(
        &self,
        job_id: &str,
        application_id: &str,
    ) -> EjrResult<Value> {
        let update = JobUpdate {
            application_id: Some(application_id.to_string()),
            ..Default::default()
        };
        self.update(job_id, &update).await
    }

    // Internal methods

    async fn search(&self, query: Value) -> EjrResult<Vec<Value>> {
        tracing::debug!(query = %query, "searching jobs");
        self.request_json(Method::POST, "/jobs/search", Some(&query), true)
            .await
    }

    async fn update(&self, job_id: &str, update: &JobUpdate) -> EjrResult<Value> {
        let path = format!("/jobs/{}", job_id);
        self.retry
            .execute(|| self.request_json(Method::PATCH, &path, Some(update), true))
            .await
    }

    async fn request_json<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        use_auth: bool,
    ) -> EjrResult<T> {
        let url = self.build_url(path);
        self.metrics.record_request();
        tracing::debug!(method = %method, url = %url, "registry request");

        let mut request = self
            .http
            .request(method, &url)
            .header(USER_AGENT, &self.config.user_agent);
        if use_auth {
            let auth_header = match self.auth_header().await {
                Ok(header) => header,
                Err(e) => {
                    self.metrics.record_failure();
                    return Err(e);
                }
            };
            request = request.header(AUTHORIZATION, auth_header);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record_failure();
                return Err(EjrError::Transport(e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.metrics.record_failure();
            let reason = status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string();
            tracing::debug!(status = status.as_u16(), %reason, url = %url, "registry error response");
            return Err(EjrHttpError::new(status.as_u16(), reason).into());
        }

        self.metrics.record_success();
        response
            .json()
            .await
            .map_err(|e| EjrError::Decode(e.to_string()))
    }

    async fn auth_header(&self) -> EjrResult<String> {
        let auth = self.auth.as_ref().ok_or_else(|| {
            EjrError::Credentials("client credentials are not configured".into())
        })?;
        let token = auth.access_token(&self.http).await?;
        Ok(format!("Bearer {}", token))
    }

    fn build_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Generates a client-side job id: `j-` plus a random hex suffix, unique
/// with overwhelming probability.
fn generate_job_id() -> String {
    format!("j-{}", Uuid::new_v4().simple())
}

/// Builder for [`JobRegistryClient`].
pub struct JobRegistryClientBuilder {
    config_builder: JobRegistryConfigBuilder,
    credentials: Option<JobRegistryCredentials>,
    token_cache: Option<Arc<dyn TokenCache>>,
}

impl JobRegistryClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            config_builder: JobRegistryConfig::builder(),
            credentials: None,
            token_cache: None,
        }
    }

    /// Sets the registry API base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.api_url(url);
        self
    }

    /// Sets the backend identifier.
    pub fn backend_id(mut self, id: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.backend_id(id);
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Sets the User-Agent header.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.user_agent(ua);
        self
    }

    /// Sets the update retry configuration.
    pub fn update_retry(mut self, retry: UpdateRetryConfig) -> Self {
        self.config_builder = self.config_builder.update_retry(retry);
        self
    }

    /// Sets the client-credentials used for authenticated operations.
    pub fn credentials(mut self, credentials: JobRegistryCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Shares an existing token cache between clients with the same
    /// credentials. By default each client owns a private in-memory cache.
    pub fn token_cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
        self.token_cache = Some(cache);
        self
    }

    /// Builds the client.
    pub fn build(self) -> EjrResult<JobRegistryClient> {
        let config = self.config_builder.build()?;
        let default_token_lifetime = config.default_token_lifetime;
        let mut client = JobRegistryClient::new(config)?;
        if let Some(credentials) = self.credentials {
            client.auth = Some(match self.token_cache {
                Some(cache) => OidcClientCredentialsAuth::with_cache(
                    credentials,
                    cache,
                    default_token_lifetime,
                ),
                None => OidcClientCredentialsAuth::new(credentials, default_token_lifetime),
            });
        }
        Ok(client)
    }
}

impl Default for JobRegistryClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> JobRegistryClient {
        JobRegistryClient::builder()
            .api_url("https://ejr.test")
            .backend_id("unittests")
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_url() {
        let client = test_client();
        assert_eq!(client.build_url("/jobs"), "https://ejr.test/jobs");
        assert_eq!(client.build_url("jobs"), "https://ejr.test/jobs");
        assert_eq!(
            client.build_url("/jobs/j-123"),
            "https://ejr.test/jobs/j-123"
        );
    }

    #[test]
    fn test_generate_job_id_shape() {
        let job_id = generate_job_id();
        let suffix = job_id.strip_prefix("j-").expect("j- prefix");
        assert_eq!(suffix.len(), 32);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!suffix.chars().any(|c| c.is_ascii_uppercase()));
        assert_ne!(generate_job_id(), job_id);
    }

    #[tokio::test]
    async fn test_auth_required_without_credentials() {
        let client = test_client();
        let result = client.auth_header().await;
        assert!(matches!(result, Err(EjrError::Credentials(_))));
    }

    #[test]
    fn test_builder_with_credentials() {
        let credentials =
            JobRegistryCredentials::new("https://oidc.test", "ejrclient", "6j7$6c76T").unwrap();
        let client = JobRegistryClient::builder()
            .api_url("https://ejr.test")
            .backend_id("unittests")
            .credentials(credentials)
            .build()
            .unwrap();
        assert!(client.auth.is_some());
        assert_eq!(client.backend_id(), "unittests");
    }
}
