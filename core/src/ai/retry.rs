//! Fixed-count retry
//!
//! The companion chat panel's strategy: the same call is repeated a fixed
//! number of times with a constant delay. Unlike the router it never changes
//! provider between attempts. Errors that are not retryable end it early.

use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::error::{HudError, Result};

#[derive(Debug, Clone, Copy)]
pub struct FixedRetry {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for FixedRetry {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(1),
        }
    }
}

impl FixedRetry {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// `max_retries + 1` attempts have failed. The closure receives the
    /// zero-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => {
                    tracing::debug!("Attempt {} failed, not retrying: {}", attempt + 1, e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::debug!("Attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        sleep(self.delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| HudError::AllProvidersExhausted {
            attempts: 0,
            last_error: "All retries failed".to_string(),
        }))
    }
}
