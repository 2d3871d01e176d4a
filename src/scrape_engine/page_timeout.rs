//! Timeout wrapper for page operations
//!
//! Every network-facing browser call goes through `with_page_timeout` so a
//! stuck navigation or DOM query surfaces as `ScrapeError::Timeout` instead of
//! hanging the job.

use std::future::Future;
use std::time::Duration;

use super::errors::{ScrapeError, ScrapeResult};

/// Run `operation` with an explicit deadline
///
/// Returns the operation's own error when it fails in time, or a
/// `Timeout` naming `operation_name` when the deadline passes first.
pub async fn with_page_timeout<F, T>(
    operation: F,
    timeout: Duration,
    operation_name: &str,
) -> ScrapeResult<T>
where
    F: Future<Output = ScrapeResult<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(ScrapeError::timeout(
            operation_name,
            timeout.as_millis() as u64,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_produces_named_timeout() {
        let result: ScrapeResult<()> = with_page_timeout(
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            },
            Duration::from_millis(10),
            "Page navigation",
        )
        .await;

        match result {
            Err(ScrapeError::Timeout { operation, millis }) => {
                assert_eq!(operation, "Page navigation");
                assert_eq!(millis, 10);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: ScrapeResult<()> = with_page_timeout(
            async { Err(ScrapeError::Navigation("net::ERR_NAME_NOT_RESOLVED".into())) },
            Duration::from_secs(1),
            "Page navigation",
        )
        .await;
        assert!(matches!(result, Err(ScrapeError::Navigation(_))));
    }
}
