//! Bounded retry for upstream classification calls.

use std::future::Future;
use std::time::Duration;
use vidstream_core::PipelineError;

/// Run `attempt` up to `max_attempts` times, sleeping `delay` between tries.
///
/// Only errors marked retryable are retried; everything else propagates
/// immediately. An exhausted budget escalates the last retryable error to
/// fatal.
pub(crate) async fn retry_with_budget<T, F, Fut>(
    max_attempts: u32,
    delay: Duration,
    mut attempt: F,
) -> Result<T, PipelineError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let max_attempts = max_attempts.max(1);

    for n in 1..=max_attempts {
        match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && n < max_attempts => {
                tracing::warn!(
                    attempt = n,
                    max_attempts,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "Retryable classification failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) if err.is_retryable() => {
                return Err(PipelineError::fatal(err.into_inner().context(format!(
                    "Classification retry budget exhausted after {} attempts",
                    max_attempts
                ))));
            }
            Err(err) => return Err(err),
        }
    }

    Err(PipelineError::fatal(anyhow::anyhow!(
        "Retry budget must allow at least one attempt"
    )))
}
