//! Retry Logic
//!
//! Exponential backoff retry with jitter for National Grid calls.

use rand::Rng;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ConfigurationError, FailureKind, NationalGridError, RetryExhaustedError};

/// Jitter applied on either side of the computed delay.
const JITTER_FACTOR: f64 = 0.25;

/// Status codes retried by default.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the un-jittered delay.
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub retryable_status_codes: Vec<u16>,
    pub retry_on_connection_errors: bool,
    pub retry_on_timeout: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            exponential_base: 2.0,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
            retry_on_connection_errors: true,
            retry_on_timeout: true,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_attempts == 0 {
            return Err(ConfigurationError::InvalidConfig {
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        }
        if !(self.exponential_base.is_finite() && self.exponential_base > 0.0) {
            return Err(ConfigurationError::InvalidConfig {
                message: "retry.exponential_base must be positive".to_string(),
            });
        }
        if self.initial_delay > self.max_delay {
            return Err(ConfigurationError::InvalidConfig {
                message: "retry.initial_delay must not exceed retry.max_delay".to_string(),
            });
        }
        Ok(())
    }

    /// Whether a failure at zero-indexed `attempt` earns another try.
    ///
    /// A 401 is retried on the first attempt only, giving each call exactly
    /// one re-authentication.
    pub fn should_retry(&self, kind: FailureKind, attempt: u32) -> bool {
        if attempt + 1 >= self.max_attempts {
            return false;
        }
        match kind {
            FailureKind::Connection => self.retry_on_connection_errors,
            FailureKind::Timeout => self.retry_on_timeout,
            FailureKind::Status(status) if self.retryable_status_codes.contains(&status) => true,
            FailureKind::Status(401) => attempt == 0,
            _ => false,
        }
    }

    /// `min(initial * base^attempt, max)` with +/-25% jitter.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.initial_delay.as_secs_f64()
            * self.exponential_base.powi(attempt.min(i32::MAX as u32) as i32);
        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        let jitter = rand::thread_rng().gen_range(-1.0..=1.0) * JITTER_FACTOR * capped_delay;
        let final_delay = (capped_delay + jitter).max(0.0);

        Duration::from_secs_f64(final_delay)
    }
}

/// Retry statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub total_attempts: u32,
    pub successful_retries: u32,
    pub failed_operations: u32,
}

/// Runs an operation under a [`RetryConfig`].
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    stats: Mutex<RetryStats>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            stats: Mutex::new(RetryStats::default()),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn get_stats(&self) -> RetryStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, update: impl FnOnce(&mut RetryStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            update(&mut stats);
        }
    }

    /// Execute `operation` until it succeeds, fails terminally, or the
    /// attempt budget is spent.
    ///
    /// A non-retryable failure before the last attempt is returned as is.
    /// Any failure on the last attempt becomes [`NationalGridError::RetryExhausted`].
    pub async fn execute<T, F, Fut>(
        &self,
        description: &str,
        operation: F,
    ) -> Result<T, NationalGridError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, NationalGridError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            self.record(|s| s.total_attempts += 1);

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        self.record(|s| s.successful_retries += 1);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if self.config.should_retry(error.failure_kind(), attempt) {
                let delay = self.config.calculate_delay(attempt);
                debug!(
                    operation = description,
                    attempt = attempt + 1,
                    max_attempts = self.config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            self.record(|s| s.failed_operations += 1);

            if attempt + 1 < self.config.max_attempts {
                return Err(error);
            }

            warn!(
                operation = description,
                attempts = attempt + 1,
                error = %error,
                "Retries exhausted"
            );
            return Err(NationalGridError::RetryExhausted(RetryExhaustedError {
                message: format!("{} failed", description),
                attempts: attempt + 1,
                last_error: Box::new(error),
            }));
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
