//! Retry utilities: backoff builders for object store operations.
//!
//! Uses `backon` for exponential backoff with jitter. Only transient store
//! errors are retried; a missing object or a malformed key fails at once.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::Deserialize;
use tracing::warn;

use crate::store::{Result, StoreError};

/// Retry policy for store operations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = single attempt).
    pub max_retries: usize,
    /// Delay before the first retry, in milliseconds.
    pub min_delay_ms: u64,
    /// Cap on the delay between retries, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Backoff for object store operations.
///
/// - Min delay: `min_delay_ms`
/// - Max delay: `max_delay_ms`
/// - Max attempts: 1 + `max_retries`
/// - Jitter enabled
pub fn store_backoff(config: &RetryConfig) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(config.min_delay_ms))
        .with_max_delay(Duration::from_millis(config.max_delay_ms))
        .with_max_times(config.max_retries)
        .with_jitter()
}

/// Run a store operation, retrying transient failures.
pub async fn with_store_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    key: &str,
    op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    op.retry(store_backoff(config))
        .when(StoreError::is_transient)
        .notify(|err: &StoreError, dur: Duration| {
            warn!(
                operation = %operation,
                key = %key,
                error = %err,
                delay = ?dur,
                "Store operation failed, retrying"
            );
        })
        .await
}
