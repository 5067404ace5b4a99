//! Bounded retry with exponential backoff for external calls
//!
//! Every outbound HTTP and RPC call goes through a [`RetryPolicy`]: up to
//! three attempts total, exponential backoff starting at 4s and capped at
//! 10s. Only transient transport failures (see [`Error::is_retryable`]) are
//! retried; payload validation failures are permanent for the call.

use std::cell::Cell;
use std::future::Future;
use std::time::Duration;

use backoff::{future::retry, ExponentialBackoff};
use tracing::warn;

use crate::error::{Error, Result};

/// Retry schedule applied uniformly around each external call site.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(4),
            max_interval: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Run `op` under this policy. Transient errors are retried until the
    /// attempt budget is spent, then the last error propagates. Permanent
    /// errors propagate immediately.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let backoff = ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            // Attempt count is the bound, not elapsed time
            max_elapsed_time: None,
            ..Default::default()
        };

        let attempts = Cell::new(0u32);
        let max_attempts = self.max_attempts;

        retry(backoff, || {
            attempts.set(attempts.get() + 1);
            let fut = op();
            let attempt = attempts.get();
            async move {
                match fut.await {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_retryable() && attempt < max_attempts => {
                        warn!(call = what, attempt, error = %e, "transient failure, retrying");
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = fast_policy().run("ok", || async { Ok(7u32) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_transient_errors_exhaust_attempt_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy()
            .run("always-down", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::Http("connection refused".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy()
            .run("bad-payload", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(Error::InvalidPayload {
                        service: "analytics".into(),
                        reason: "missing field".into(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run("flaky", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Error::HttpTimeout("slow".into()))
                    } else {
                        Ok("up")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "up");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
