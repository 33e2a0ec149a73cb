//! Store error types

/// Error type for key-value store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("lease {0} not found")]
    LeaseNotFound(i64),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("watch stream closed: {0}")]
    WatchClosed(String),

    #[cfg(feature = "etcd")]
    #[error("etcd error: {0}")]
    Etcd(#[from] etcd_client::Error),
}

impl StoreError {
    /// Whether retrying the same call later can succeed
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) | StoreError::Timeout(_) | StoreError::WatchClosed(_) => {
                true
            }
            StoreError::LeaseNotFound(_) | StoreError::InvalidArgument(_) => false,
            #[cfg(feature = "etcd")]
            StoreError::Etcd(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Bound a store future by `timeout`, mapping elapse to [`StoreError::Timeout`]
pub async fn with_timeout<T, F>(timeout: std::time::Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = StoreError::LeaseNotFound(42);
        assert_eq!(err.to_string(), "lease 42 not found");

        let err = StoreError::Unavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "store unavailable: connection refused");
    }

    #[test]
    fn test_is_transient() {
        assert!(StoreError::Timeout(Duration::from_secs(2)).is_transient());
        assert!(StoreError::Unavailable("x".to_string()).is_transient());
        assert!(!StoreError::LeaseNotFound(1).is_transient());
        assert!(!StoreError::InvalidArgument("ttl".to_string()).is_transient());
    }

    #[tokio::test]
    async fn test_with_timeout_elapses() {
        let result: Result<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
