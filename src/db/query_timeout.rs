// Store round-trip timeout protection
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use super::StoreError;

pub struct QueryTimeout;

impl QueryTimeout {
    /// Run a store future with a deadline. When the deadline passes the future
    /// is dropped, which rolls back any open transaction it owned.
    pub async fn execute_with_timeout<F, T>(
        query_fn: F,
        timeout_duration: Duration,
    ) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match timeout(timeout_duration, query_fn).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Store operation timed out after {:?}", timeout_duration);
                Err(StoreError::Timeout(timeout_duration))
            }
        }
    }

    /// Default timeout for single lookups and listings (5 seconds)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Timeout for a multi-entity commit (10 seconds)
    pub const COMMIT_TIMEOUT: Duration = Duration::from_secs(10);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_future_passes_through() {
        let result = QueryTimeout::execute_with_timeout(
            async { Ok::<_, StoreError>(7) },
            Duration::from_millis(50),
        )
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_slow_future_times_out() {
        let result = QueryTimeout::execute_with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, StoreError>(())
            },
            Duration::from_millis(10),
        )
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }
}
