//! Logging helpers and request metrics.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Runs an operation, logging and suppressing any error it returns.
///
/// The error is logged as a warning carrying `context` and the error
/// message, and `None` is returned; execution continues as if the block
/// completed normally. Intended for call sites where a registry failure
/// must not abort the caller (best-effort status reporting). Suppression
/// is blanket, not selective; callers opt in explicitly.
pub async fn just_log_errors<T, E, Fut>(context: &str, operation: Fut) -> Option<T>
where
    E: Display,
    Fut: Future<Output = Result<T, E>>,
{
    match operation.await {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(context = %context, error = %error, "caught and suppressed error");
            None
        }
    }
}

/// Request counters for job registry operations.
#[derive(Debug, Default)]
pub struct Metrics {
    requests_total: AtomicU64,
    requests_success: AtomicU64,
    requests_failed: AtomicU64,
}

impl Metrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an attempted request.
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful request.
    pub fn record_success(&self) {
        self.requests_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed request.
    pub fn record_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Total requests attempted.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Requests that completed with a 2xx response.
    pub fn successful_requests(&self) -> u64 {
        self.requests_success.load(Ordering::Relaxed)
    }

    /// Requests that failed (any error kind).
    pub fn failed_requests(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }
}
