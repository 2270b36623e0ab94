use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::store::{codes, StoreError};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Whether a store failure is transient infrastructure trouble worth retrying.
///
/// Connection, server-selection, network-timeout and reconnect failures are
/// recoverable, as are operation failures carrying a timeout or memory-limit
/// code. Everything else fails fast, including codes this function does not
/// recognise.
pub fn is_recoverable(error: &StoreError) -> bool {
    match error {
        StoreError::ConnectionFailure(_)
        | StoreError::ServerSelectionTimeout(_)
        | StoreError::NetworkTimeout(_)
        | StoreError::AutoReconnect(_) => true,
        StoreError::DuplicateKey(_) | StoreError::Write(_) => false,
        StoreError::OperationFailure { code, .. } => {
            if codes::NON_RECOVERABLE.contains(code) {
                false
            } else {
                codes::TIMEOUT_FAMILY.contains(code) || codes::MEMORY_LIMIT_FAMILY.contains(code)
            }
        }
        StoreError::PartialFailure { .. } | StoreError::Other(_) => false,
    }
}

/// Bounded exponential backoff around a single store operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the 1st, 2nd, 3rd... retry; the last entry repeats.
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let index = (retry.saturating_sub(1) as usize).min(self.backoff.len().saturating_sub(1));
        self.backoff.get(index).copied().unwrap_or_default()
    }

    /// Runs `operation` up to `max_retries + 1` times, sleeping between
    /// attempts while the failure is recoverable. The last error is returned
    /// unchanged once attempts run out or a failure is not recoverable.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let attempts = self.max_retries.saturating_add(1);
        let mut attempt = 1;

        loop {
            debug!("Executing {} (attempt {}/{})", label, attempt, attempts);

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} succeeded after retry on attempt {}/{}", label, attempt, attempts);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if !is_recoverable(&e) {
                        error!("{} failed with non-recoverable error: {}", label, e);
                        return Err(e);
                    }
                    if attempt >= attempts {
                        error!("{} failed after {} attempts: {}", label, attempts, e);
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed with recoverable error (attempt {}/{}): {}. Retrying in {:?}...",
                        label, attempt, attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
