//! Bounded retry for counter-store operations and transient error classification.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::errors::AppError;

/// Configuration for counter retries with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: usize,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 10,
            max_delay_ms: 250,
        }
    }
}

impl RetryConfig {
    /// Creates an exponential backoff builder with jitter.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// Run `op`, retrying while `is_transient` holds, up to the configured budget.
///
/// A transient error that survives the budget becomes
/// [`AppError::TransientContention`]; any other error is converted as-is.
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    context: &str,
    is_transient: fn(&E) -> bool,
    op: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + Into<AppError>,
{
    op.retry(config.backoff())
        .when(|e| is_transient(e))
        .notify(|err, dur| {
            tracing::warn!(
                context = %context,
                error = %err,
                retry_in = ?dur,
                "Counter operation failed, retrying"
            );
        })
        .await
        .map_err(|e| {
            if is_transient(&e) {
                AppError::TransientContention(format!(
                    "{context}: retry budget of {} exhausted: {e}",
                    config.max_retries
                ))
            } else {
                e.into()
            }
        })
}

/// Postgres errors worth retrying: serialization failures, deadlocks,
/// lock timeouts, pool exhaustion and dropped connections.
pub fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            Some("40001" | "40P01" | "55P03" | "57P01" | "08006" | "08003")
        ),
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        _ => false,
    }
}

/// Redis errors worth retrying: timeouts and connection loss.
pub fn is_transient_redis(err: &redis::RedisError) -> bool {
    err.is_timeout() || err.is_connection_dropped() || err.is_io_error() || err.is_connection_refusal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config(max_retries: usize) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    fn internal_is_transient(err: &AppError) -> bool {
        matches!(err, AppError::Internal(_))
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.initial_delay_ms, 10);
        assert_eq!(config.max_delay_ms, 250);
    }

    #[test]
    fn pool_timeout_is_transient() {
        assert!(is_transient_sqlx(&sqlx::Error::PoolTimedOut));
        assert!(!is_transient_sqlx(&sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result = with_retry(&fast_config(3), "test", internal_is_transient, || async move {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::Internal("busy".to_string()))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_transient_contention() {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result: Result<i64, AppError> =
            with_retry(&fast_config(3), "test", internal_is_transient, || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Internal("busy".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AppError::TransientContention(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let result: Result<i64, AppError> =
            with_retry(&fast_config(3), "test", internal_is_transient, || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Validation("bad".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
