//! OAuth2 client-credentials authentication against the registry's OIDC issuer.

use crate::config::DEFAULT_TOKEN_LIFETIME;
use crate::errors::{EjrError, EjrResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Environment variable holding the OIDC issuer URL.
pub const ENV_OIDC_ISSUER: &str = "EJR_OIDC_ISSUER";
/// Environment variable holding the OAuth2 client id.
pub const ENV_OIDC_CLIENT_ID: &str = "EJR_OIDC_CLIENT_ID";
/// Environment variable holding the OAuth2 client secret.
pub const ENV_OIDC_CLIENT_SECRET: &str = "EJR_OIDC_CLIENT_SECRET";

/// Client id and secret as found in a configuration mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCredentialsConfig {
    /// OAuth2 client identifier.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
}

/// Credentials for the client-credentials grant: issuer, client id, secret.
///
/// Immutable once constructed. The secret is redacted in `Debug` and
/// `Display` output; equality is structural and independent of how the
/// credentials were resolved.
#[derive(Clone)]
pub struct JobRegistryCredentials {
    /// OIDC issuer URL.
    pub oidc_issuer: String,
    /// OAuth2 client identifier.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: SecretString,
}

impl JobRegistryCredentials {
    /// Creates credentials from explicit values.
    ///
    /// All three fields must be non-empty: a misconfigured client must
    /// never proceed silently.
    pub fn new(
        oidc_issuer: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> EjrResult<Self> {
        let oidc_issuer = oidc_issuer.into();
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        for (field, value) in [
            ("oidc_issuer", &oidc_issuer),
            ("client_id", &client_id),
            ("client_secret", &client_secret),
        ] {
            if value.is_empty() {
                return Err(EjrError::Credentials(format!("{} is empty", field)));
            }
        }
        Ok(Self {
            oidc_issuer,
            client_id,
            client_secret: SecretString::new(client_secret),
        })
    }

    /// Resolves credentials from a configuration mapping or the environment.
    ///
    /// Precedence: explicit `oidc_issuer` argument and `config` values
    /// first, then the `EJR_OIDC_*` environment variables. Fails with
    /// [`EjrError::Credentials`] if any field resolves to nothing.
    pub fn from_config_or_env(
        oidc_issuer: Option<&str>,
        config: Option<&ClientCredentialsConfig>,
    ) -> EjrResult<Self> {
        let issuer = match oidc_issuer {
            Some(issuer) => issuer.to_string(),
            None => std::env::var(ENV_OIDC_ISSUER)
                .map_err(|_| EjrError::Credentials(format!("{} is not set", ENV_OIDC_ISSUER)))?,
        };
        let (client_id, client_secret) = match config {
            Some(config) => (config.client_id.clone(), config.client_secret.clone()),
            None => (
                std::env::var(ENV_OIDC_CLIENT_ID).map_err(|_| {
                    EjrError::Credentials(format!("{} is not set", ENV_OIDC_CLIENT_ID))
                })?,
                std::env::var(ENV_OIDC_CLIENT_SECRET).map_err(|_| {
                    EjrError::Credentials(format!("{} is not set", ENV_OIDC_CLIENT_SECRET))
                })?,
            ),
        };
        Self::new(issuer, client_id, client_secret)
    }

    /// Cache key identifying this credential set.
    pub(crate) fn cache_key(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}",
            self.oidc_issuer,
            self.client_id,
            self.client_secret.expose_secret()
        )
    }
}

impl PartialEq for JobRegistryCredentials {
    fn eq(&self, other: &Self) -> bool {
        self.oidc_issuer == other.oidc_issuer
            && self.client_id == other.client_id
            && self.client_secret.expose_secret() == other.client_secret.expose_secret()
    }
}

impl Eq for JobRegistryCredentials {}

impl std::fmt::Debug for JobRegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "JobRegistryCredentials(oidc_issuer={:?}, client_id={:?}, client_secret=\"***\")",
            self.oidc_issuer, self.client_id
        )
    }
}

impl std::fmt::Display for JobRegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// A cached bearer token together with its expiry instant.
///
/// Replaced wholesale on refresh, never partially updated.
#[derive(Clone)]
pub struct CachedToken {
    access_token: SecretString,
    /// Instant at which the token stops being usable.
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Creates a cached token.
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            expires_at,
        }
    }

    /// The raw access token, for building an Authorization header.
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Expiry check, inclusive: a token is never used at or after its
    /// nominal expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token cache interface: at most one valid token per credential set.
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Returns the cached token for these credentials, if any.
    async fn get(&self, credentials: &JobRegistryCredentials) -> Option<CachedToken>;

    /// Stores (replacing) the token for these credentials.
    async fn put(&self, credentials: &JobRegistryCredentials, token: CachedToken);
}

/// In-memory token cache keyed by the full credential tuple.
///
/// Concurrent readers see either the previous valid token or a fully
/// formed fresh one, never a torn entry.
#[derive(Default)]
pub struct InMemoryTokenCache {
    entries: RwLock<HashMap<String, CachedToken>>,
}

impl InMemoryTokenCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn get(&self, credentials: &JobRegistryCredentials) -> Option<CachedToken> {
        self.entries
            .read()
            .await
            .get(&credentials.cache_key())
            .cloned()
    }

    async fn put(&self, credentials: &JobRegistryCredentials, token: CachedToken) {
        self.entries
            .write()
            .await
            .insert(credentials.cache_key(), token);
    }
}

/// Token response from the issuer's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// OIDC provider metadata, as served from the well-known endpoint.
#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    token_endpoint: String,
}

/// Supplies valid bearer tokens for one credential set via the
/// client-credentials grant, caching them until expiry.
pub struct OidcClientCredentialsAuth {
    credentials: JobRegistryCredentials,
    cache: Arc<dyn TokenCache>,
    default_token_lifetime: Duration,
}

impl OidcClientCredentialsAuth {
    /// Creates an authenticator with its own in-memory token cache.
    pub fn new(credentials: JobRegistryCredentials, default_token_lifetime: Duration) -> Self {
        Self::with_cache(
            credentials,
            Arc::new(InMemoryTokenCache::new()),
            default_token_lifetime,
        )
    }

    /// Creates an authenticator sharing an existing token cache.
    pub fn with_cache(
        credentials: JobRegistryCredentials,
        cache: Arc<dyn TokenCache>,
        default_token_lifetime: Duration,
    ) -> Self {
        Self {
            credentials,
            cache,
            default_token_lifetime,
        }
    }

    /// The credentials this authenticator was set up with.
    pub fn credentials(&self) -> &JobRegistryCredentials {
        &self.credentials
    }

    /// Returns a valid access token, refreshing via the token endpoint
    /// only when none is cached or the cached one is expired.
    ///
    /// Token-endpoint failures surface as [`EjrError::TokenExchange`] and
    /// are not retried here.
    pub async fn access_token(&self, http: &reqwest::Client) -> EjrResult<String> {
        if let Some(token) = self.cache.get(&self.credentials).await {
            if !token.is_expired(Utc::now()) {
                return Ok(token.access_token().to_string());
            }
        }
        let token = self.request_token(http).await?;
        let access_token = token.access_token().to_string();
        self.cache.put(&self.credentials, token).await;
        Ok(access_token)
    }

    async fn request_token(&self, http: &reqwest::Client) -> EjrResult<CachedToken> {
        let token_endpoint = self.discover_token_endpoint(http).await?;
        let request_time = Utc::now();

        tracing::debug!(
            issuer = %self.credentials.oidc_issuer,
            client_id = %self.credentials.client_id,
            "requesting access token (client_credentials grant)"
        );

        let response = http
            .post(&token_endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", &self.credentials.client_id),
                (
                    "client_secret",
                    self.credentials.client_secret.expose_secret(),
                ),
            ])
            .send()
            .await
            .map_err(|e| EjrError::TokenExchange(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EjrError::TokenExchange(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| EjrError::TokenExchange(format!("invalid token response: {}", e)))?;

        let lifetime = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(self.default_token_lifetime);
        let expires_at = request_time
            + ChronoDuration::from_std(lifetime)
                .map_err(|e| EjrError::TokenExchange(format!("invalid token lifetime: {}", e)))?;

        Ok(CachedToken::new(token.access_token, expires_at))
    }

    async fn discover_token_endpoint(&self, http: &reqwest::Client) -> EjrResult<String> {
        let url = format!(
            "{}/.well-known/openid-configuration",
            self.credentials.oidc_issuer.trim_end_matches('/')
        );
        let response = http
            .get(&url)
            .send()
            .await
            .map_err(|e| EjrError::TokenExchange(format!("issuer unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EjrError::TokenExchange(format!(
                "OIDC discovery returned HTTP {}",
                status.as_u16()
            )));
        }

        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| EjrError::TokenExchange(format!("invalid OIDC metadata: {}", e)))?;
        Ok(metadata.token_endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_validates_fields() {
        assert!(JobRegistryCredentials::new("https://oidc.test/", "c123", "s3cr3t").is_ok());
        for (issuer, id, secret) in [
            ("", "c123", "s3cr3t"),
            ("https://oidc.test/", "", "s3cr3t"),
            ("https://oidc.test/", "c123", ""),
        ] {
            let result = JobRegistryCredentials::new(issuer, id, secret);
            assert!(matches!(result, Err(EjrError::Credentials(_))));
        }
    }

    #[test]
    fn test_redacted_representation() {
        let creds = JobRegistryCredentials::new("https://oidc.test/", "c123", "@#$").unwrap();
        let expected = "JobRegistryCredentials(oidc_issuer=\"https://oidc.test/\", \
                        client_id=\"c123\", client_secret=\"***\")";
        assert_eq!(format!("{:?}", creds), expected);
        assert_eq!(format!("{}", creds), expected);
        assert!(!format!("{:?}", creds).contains("@#$"));
    }

    #[test]
    fn test_structural_equality_across_construction_paths() {
        let explicit = JobRegistryCredentials::new("https://oidc.test/", "c456789", "s3cr3t")
            .unwrap();
        let config = ClientCredentialsConfig {
            client_id: "c456789".into(),
            client_secret: "s3cr3t".into(),
        };
        let from_config =
            JobRegistryCredentials::from_config_or_env(Some("https://oidc.test/"), Some(&config))
                .unwrap();
        assert_eq!(explicit, from_config);
    }

    // Single test for everything touching the EJR_OIDC_* variables: the
    // process environment is shared between concurrently running tests.
    #[test]
    fn test_env_resolution_and_precedence() {
        std::env::set_var(ENV_OIDC_ISSUER, "https://id.example");
        std::env::set_var(ENV_OIDC_CLIENT_ID, "c-9876");
        std::env::set_var(ENV_OIDC_CLIENT_SECRET, "!@#$%%");

        // Nothing explicit: everything resolves from the environment.
        let creds = JobRegistryCredentials::from_config_or_env(None, None).unwrap();
        assert_eq!(creds.oidc_issuer, "https://id.example");
        assert_eq!(creds.client_id, "c-9876");
        assert_eq!(creds.client_secret.expose_secret(), "!@#$%%");

        // A configuration mapping wins over the environment variables.
        let config = ClientCredentialsConfig {
            client_id: "cfg-id".into(),
            client_secret: "cfg-secret".into(),
        };
        let creds = JobRegistryCredentials::from_config_or_env(None, Some(&config)).unwrap();
        assert_eq!(creds.oidc_issuer, "https://id.example");
        assert_eq!(creds.client_id, "cfg-id");
        assert_eq!(creds.client_secret.expose_secret(), "cfg-secret");

        // An explicit issuer wins over the environment variable.
        let creds =
            JobRegistryCredentials::from_config_or_env(Some("https://explicit.example"), Some(&config))
                .unwrap();
        assert_eq!(creds.oidc_issuer, "https://explicit.example");
        assert_eq!(creds.client_id, "cfg-id");

        std::env::remove_var(ENV_OIDC_ISSUER);
        std::env::remove_var(ENV_OIDC_CLIENT_ID);
        std::env::remove_var(ENV_OIDC_CLIENT_SECRET);
    }

    #[test]
    fn test_token_expiry_is_inclusive() {
        let expires_at = Utc.with_ymd_and_hms(2020, 1, 2, 12, 0, 0).unwrap();
        let token = CachedToken::new("t0k3n", expires_at);
        assert!(!token.is_expired(expires_at - ChronoDuration::seconds(1)));
        assert!(token.is_expired(expires_at));
        assert!(token.is_expired(expires_at + ChronoDuration::seconds(1)));
    }

    #[tokio::test]
    async fn test_in_memory_cache_roundtrip() {
        let cache = InMemoryTokenCache::new();
        let creds = JobRegistryCredentials::new("https://oidc.test/", "c123", "s3cr3t").unwrap();
        assert!(cache.get(&creds).await.is_none());

        let expires_at = Utc::now() + ChronoDuration::minutes(5);
        cache.put(&creds, CachedToken::new("t0k3n", expires_at)).await;
        let token = cache.get(&creds).await.unwrap();
        assert_eq!(token.access_token(), "t0k3n");
        assert_eq!(token.expires_at, expires_at);

        // Distinct credential sets get distinct entries.
        let other = JobRegistryCredentials::new("https://oidc.test/", "c999", "s3cr3t").unwrap();
        assert!(cache.get(&other).await.is_none());
    }
}
