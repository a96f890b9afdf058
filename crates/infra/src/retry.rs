//! Bounded retry of whole transactions on lock conflicts.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::error::StockError;

/// How often, and how patiently, a conflicting transaction is re-run.
///
/// Each attempt must begin a fresh transaction. Only `StockError::Conflict`
/// is retried; anything else returns immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before attempt `n + 1` is `base_backoff * n`.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }

    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(attempt)
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent (then `StockError::System`).
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, StockError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, StockError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut n = 1;
        loop {
            match attempt(n).await {
                Err(StockError::Conflict(reason)) if n < max_attempts => {
                    warn!(
                        operation,
                        attempt = n,
                        max_attempts,
                        %reason,
                        "transaction conflict, retrying"
                    );
                    tokio::time::sleep(self.backoff_after(n)).await;
                    n += 1;
                }
                Err(StockError::Conflict(reason)) => {
                    error!(operation, attempts = n, %reason, "transaction retries exhausted");
                    return Err(StockError::System(format!(
                        "{operation} gave up after {n} attempts: {reason}"
                    )));
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn conflicts_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let out = policy
            .run("test", |n| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(StockError::Conflict("busy".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(out, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_becomes_a_system_error() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let out: Result<(), _> = policy
            .run("test", |_| async { Err(StockError::Conflict("busy".into())) })
            .await;
        assert!(matches!(out, Err(StockError::System(_))));
    }

    #[tokio::test]
    async fn business_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = RetryPolicy::default()
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StockError::NotFound("product".into())) }
            })
            .await;
        assert!(matches!(out, Err(StockError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_after(1), Duration::from_millis(25));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(75));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
