//! Resilience
//!
//! Exponential backoff retry with jitter. The retry decision is a pure
//! function of the failure's [`FailureKind`](crate::error::FailureKind) and
//! the attempt number.

pub mod retry;

pub use retry::{RetryConfig, RetryExecutor, RetryStats, DEFAULT_RETRYABLE_STATUS_CODES};
