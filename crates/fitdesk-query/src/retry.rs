//! Bounded retry for fetches and mutations

use fitdesk_client::{ApiError, ApiResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Run `operation`, retrying up to `retries` more times on retryable errors
///
/// Unauthorized, client and local errors are returned immediately. The wait
/// between attempts is cut short by `token`.
pub(crate) async fn with_retry<T, F, Fut>(
    label: &str,
    retries: u32,
    delay: Duration,
    token: &CancellationToken,
    mut operation: F,
) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries && e.is_retryable() && !token.is_cancelled() => {
                attempt += 1;
                debug!(
                    operation = %label,
                    attempt,
                    retries,
                    error = %e,
                    "Retrying after failure"
                );
                tokio::select! {
                    biased;
                    () = token.cancelled() => return Err(ApiError::cancelled()),
                    () = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => return Err(e),
        }
    }
}
