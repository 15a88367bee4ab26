//! Retrying operations that fail on eventual consistency

use crate::error::{CloudError, Result};
use crate::provider::RetryConfig;
use std::future::Future;

/// Run `op` until it succeeds, the error is not retryable, or
/// `config.max_attempts` is exhausted.
pub async fn retry_when<T, F, Fut, P>(config: &RetryConfig, mut op: F, is_retryable: P) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&CloudError) -> bool,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.max_attempts && is_retryable(&e) => {
                let delay = config.delay_for(attempt);
                tracing::debug!("Retryable error (attempt {attempt}): {e}; retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Retry while the API error code equals one of `codes`.
pub async fn retry_when_code<T, F, Fut>(config: &RetryConfig, op: F, codes: &[&str]) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_when(config, op, |e| codes.iter().any(|c| e.code_equals(c))).await
}

/// Retry while the API error has `code` and its message contains `needle`.
pub async fn retry_when_message_contains<T, F, Fut>(
    config: &RetryConfig,
    op: F,
    code: &str,
    needle: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_when(config, op, |e| e.message_contains(code, needle)).await
}
