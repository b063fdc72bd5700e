//! Retry with exponential backoff and jitter for registry requests.
//!
//! Only transient failures are retried: HTTP 429, 5xx responses and
//! network-level errors. Everything else (404, other 4xx, unparseable
//! bodies) is returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::RegistryError;

const MAX_DELAY_MS: u64 = 60_000;

/// Returns `true` if `err` is worth another attempt after a backoff delay.
pub(crate) fn is_retriable(err: &RegistryError) -> bool {
    match err {
        RegistryError::RateLimited { .. } | RegistryError::Http(_) => true,
        RegistryError::UnexpectedStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors.
///
/// The wait before retry `n` is `backoff_base_ms * 2^(n-1)` with ±25 %
/// jitter, capped at 60 s. A rate-limit response with a larger
/// `Retry-After` wins over the computed delay (within the same cap).
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, RegistryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RegistryError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay_ms = backoff_delay_ms(backoff_base_ms, attempt, &err);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient registry error, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

fn backoff_delay_ms(backoff_base_ms: u64, attempt: u32, err: &RegistryError) -> u64 {
    let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jittered = (computed.min(MAX_DELAY_MS) as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
    let floor = match err {
        RegistryError::RateLimited { retry_after_secs } if backoff_base_ms > 0 => {
            retry_after_secs.saturating_mul(1000)
        }
        _ => 0,
    };
    jittered.max(floor).min(MAX_DELAY_MS)
}
