//! Error types for the job registry client.

use thiserror::Error;

/// Result type alias for job registry operations.
pub type EjrResult<T> = Result<T, EjrError>;

/// Error raised when the registry responds with a non-2xx status.
///
/// For update operations this is only surfaced once the retry budget is
/// exhausted; create, search and health operations surface it on the first
/// failing response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("registry responded with HTTP {status} {reason}")]
pub struct EjrHttpError {
    /// HTTP status code of the failing response.
    pub status: u16,
    /// Reason phrase (or best-effort description) of the failure.
    pub reason: String,
}

impl EjrHttpError {
    /// Creates an error from a status code and reason phrase.
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }
}

/// Error type for all job registry operations.
///
/// Every failure that escapes the client is one of these variants, never a
/// raw transport error: callers can match on failure kind without knowing
/// the underlying HTTP library.
#[derive(Error, Debug)]
pub enum EjrError {
    /// Invalid or missing client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Missing or malformed credentials.
    #[error("credentials error: {0}")]
    Credentials(String),

    /// The token endpoint was unreachable or rejected the grant request.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// The registry responded with a non-2xx status.
    #[error(transparent)]
    Http(#[from] EjrHttpError),

    /// HTTP transport failure (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body could not be parsed as the expected JSON shape.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EjrError {
    /// Returns the HTTP status code if this is a registry HTTP error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => Some(e.status),
            _ => None,
        }
    }

    /// Returns true if this error is an HTTP response error.
    ///
    /// Only these are candidates for the update retry policy; transport,
    /// token and serialization failures surface immediately.
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}
