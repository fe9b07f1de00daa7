//! Retry logic with exponential backoff and jitter for upstream calls.

use crate::config::NetworkConfig;
use crate::error::{FxError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff policy for upstream requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// Whether to scale delays by a random factor in `0.5..1.5`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: NetworkConfig::MAX_RETRIES,
            base_delay: NetworkConfig::RETRY_BASE_DELAY,
            max_delay: NetworkConfig::RETRY_MAX_DELAY,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that makes a single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `retry` (0-indexed): `base * 2^retry`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let doubled = self.base_delay.as_secs_f64() * 2f64.powi(retry as i32);
        let capped = doubled.min(self.max_delay.as_secs_f64());

        let secs = if self.jitter {
            let factor = rand::rng().random_range(0.5..1.5);
            (capped * factor).min(self.max_delay.as_secs_f64())
        } else {
            capped
        };

        Duration::from_secs_f64(secs)
    }

    /// Delay to wait after `err`: honors an upstream `Retry-After` when it
    /// is larger than the computed backoff.
    fn delay_after(&self, retry: u32, err: &FxError) -> Duration {
        let backoff = self.delay_for(retry);
        match err {
            FxError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => backoff.max(Duration::from_secs(*secs)).min(self.max_delay),
            _ => backoff,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are exhausted.
pub async fn retry_async<F, Fut, T>(policy: &RetryPolicy, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded after {} attempts", label, attempt);
                }
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => {
                debug!("{} failed with non-retryable error: {}", label, err);
                return Err(err);
            }
            Err(err) if attempt >= policy.max_attempts => {
                warn!(
                    "{}: all {} attempts exhausted. Last error: {}",
                    label, policy.max_attempts, err
                );
                return Err(err);
            }
            Err(err) => {
                let delay = policy.delay_after(attempt - 1, &err);
                warn!(
                    "{}: attempt {}/{} failed: {}. Retrying in {:?}",
                    label, attempt, policy.max_attempts, err, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
