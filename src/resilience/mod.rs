//! Retry policy for registry update operations.

use crate::config::UpdateRetryConfig;
use crate::errors::EjrResult;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Bounded fixed-delay retry for a single logical update call.
///
/// Scoped to PATCH-style updates: the registry can transiently answer
/// "not found" shortly after a create, so those calls get a small retry
/// budget. Only HTTP response errors are retried; transport, token and
/// serialization failures surface immediately.
pub struct UpdateRetry {
    max_attempts: u32,
    delay: Duration,
}

impl UpdateRetry {
    /// Creates a retry policy from configuration.
    pub fn new(config: &UpdateRetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.delay,
        }
    }

    /// Executes an operation, retrying on HTTP error responses.
    ///
    /// Returns on the first success with no further attempts and no extra
    /// delay; once attempts are exhausted the last HTTP error surfaces.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> EjrResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EjrResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_http() || attempt >= self.max_attempts {
                        return Err(e);
                    }
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "update failed, retrying"
                    );
                    sleep(self.delay).await;
                }
            }
        }
    }
}
