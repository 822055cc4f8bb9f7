//! Caller-supplied deadlines for extraction and evaluation.

use std::future::Future;
use std::time::Duration;

use procura_core::error::CoreError;

/// Run `fut` with a deadline; on expiry nothing it would have written is
/// written and [`CoreError::Timeout`] is returned.
pub async fn with_timeout<T, F>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, limit_ms = limit.as_millis() as u64, "Operation timed out");
            Err(CoreError::Timeout {
                operation,
                elapsed_ms: limit.as_millis() as u64,
            })
        }
    }
}
