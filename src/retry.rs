//! Retry logic with incremental backoff
//!
//! Transient download failures are retried up to [`RetryConfig::max_attempts`] total attempts.
//! The delay grows by `backoff_multiplier` after every retry and is capped at `max_delay`;
//! optional jitter spreads workers that failed together.
//!
//! # Example
//!
//! ```no_run
//! use twic_dl::retry::{IsRetryable, download_with_retry};
//! use twic_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let outcome = download_with_retry(&config, || async {
//!     Ok::<_, MyError>(())
//! })
//! .await
//! .map_err(|failed| failed.value)?;
//! println!("done after {} attempt(s)", outcome.attempts);
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, FetchError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, 5xx answers) return `true`.
/// Permanent failures (404, invalid URL, disk full) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. }
            | FetchError::Connect { .. }
            | FetchError::Request { .. }
            | FetchError::Body { .. } => true,
            // 429 Too Many Requests is the server asking us to slow down
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Fetch(e) => e.is_retryable(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. }
            | Error::Parse(_)
            | Error::MalformedArchive(_)
            | Error::Serialization(_)
            | Error::MissingInput(_)
            | Error::Unwritable { .. }
            | Error::Other(_) => false,
        }
    }
}

/// A value together with the number of attempts it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<V> {
    /// Operation output (success value or last error)
    pub value: V,
    /// Attempts made, including the first
    pub attempts: u32,
}

/// Execute an async operation, retrying transient failures with incremental backoff
///
/// Returns the success value or the last error, each tagged with the number of attempts made.
/// A non-retryable error ends the loop immediately.
pub async fn download_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<Retried<T>, Retried<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "operation succeeded after retry");
                }
                return Ok(Retried {
                    value,
                    attempts: attempt,
                });
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis(),
                    "operation failed, retrying"
                );

                let wait = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };
                tokio::time::sleep(wait).await;

                attempt += 1;
                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "operation failed after all attempts"
                    );
                } else {
                    tracing::error!(error = %e, "operation failed with non-retryable error");
                }
                return Err(Retried {
                    value: e,
                    attempts: attempt,
                });
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
