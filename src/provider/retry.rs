//! Exponential backoff retry around provider calls.

use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tracing::warn;

use crate::config::MapConfig;
use crate::error::ProviderError;
use crate::provider::{Summarizer, UnitContext};

/// Call a provider with a per-attempt deadline and bounded retries.
///
/// `max_attempts` counts the first call. Transient errors are stashed
/// and retried after an exponentially increasing sleep; fatal errors
/// return immediately since repeating them cannot help.
pub async fn call_with_retry(
    provider: &dyn Summarizer,
    ctx: &UnitContext<'_>,
    config: &MapConfig,
) -> Result<String, ProviderError> {
    let mut backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(config.initial_backoff_ms),
        max_interval: Duration::from_millis(config.max_backoff_ms),
        max_elapsed_time: None,
        ..Default::default()
    };

    let mut attempts = 0;
    let mut last_error = None;

    while attempts < config.max_attempts {
        attempts += 1;

        let outcome = tokio::time::timeout(
            Duration::from_secs(config.timeout_secs),
            provider.summarize(ctx),
        )
        .await;

        match outcome {
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(e)) if !e.is_transient() => return Err(e),
            Ok(Err(e)) => {
                warn!(
                    unit = %ctx.unit.id,
                    attempt = attempts,
                    "Provider call failed: {e}"
                );
                last_error = Some(e);
            }
            Err(_) => {
                warn!(
                    unit = %ctx.unit.id,
                    attempt = attempts,
                    "Provider call timed out after {}s",
                    config.timeout_secs
                );
                last_error = Some(ProviderError::Timeout {
                    provider: provider.id(),
                    seconds: config.timeout_secs,
                });
            }
        }

        if attempts < config.max_attempts
            && let Some(wait_duration) = backoff.next_backoff()
        {
            tokio::time::sleep(wait_duration).await;
        }
    }

    Err(last_error.expect("last_error should be Some after failed attempts"))
}
