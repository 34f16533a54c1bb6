//! # Job Registry Integration Library
//!
//! A production-ready client for the Elastic Job Registry (EJR): lifecycle
//! bookkeeping for asynchronous compute jobs against a remote registry
//! service, with:
//! - OAuth2 client-credentials authentication with transparent token caching
//! - Typed error taxonomy ([`EjrError`] / [`EjrHttpError`])
//! - Bounded fixed-delay retries for update operations
//! - Precise merge semantics for partial updates (omission ≠ clearing)
//! - Opt-in error suppression for best-effort call sites
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_job_registry::{JobRegistryClient, JobRegistryCredentials, JobStatus};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = JobRegistryCredentials::from_config_or_env(None, None)?;
//!     let client = JobRegistryClient::builder()
//!         .api_url("https://jobregistry.example")
//!         .backend_id("my-backend")
//!         .credentials(credentials)
//!         .build()?;
//!
//!     let job = client
//!         .create_job(json!({"process_graph": {}}), "john", None)
//!         .await?;
//!     client
//!         .set_status(&job.job_id, JobStatus::Queued, None, None, None)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod types;

// Authentication
pub mod auth;

// HTTP client
pub mod client;

// Resilience patterns
pub mod resilience;

// Observability
pub mod observability;

// Re-exports for convenience
pub use auth::{
    CachedToken, ClientCredentialsConfig, InMemoryTokenCache, JobRegistryCredentials,
    OidcClientCredentialsAuth, TokenCache,
};
pub use client::{JobRegistryClient, JobRegistryClientBuilder};
pub use config::{JobRegistryConfig, JobRegistryConfigBuilder, UpdateRetryConfig};
pub use errors::{EjrError, EjrHttpError, EjrResult};
pub use observability::{just_log_errors, Metrics};
pub use resilience::UpdateRetry;
pub use types::{format_timestamp, DependencyStatus, JobRecord, JobStatus, JobUpdate};
