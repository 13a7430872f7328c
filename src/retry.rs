//! Shared retry/backoff helper used by the slide producer (C6) and the
//! pronunciation resolver's LLM verification step (C4), grounded on the
//! retry loop in `transcribe/gemini.rs::call_generate_content`.

use crate::error::{Result, VideoGenError};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let millis = self.base_delay_ms as f64 * self.backoff_factor.powi(attempt as i32 - 1);
        Duration::from_millis(millis as u64)
    }
}

/// Run `op` up to `config.max_retries` times with exponential backoff between
/// attempts. `op` returns `Ok(Some(value))` on success, `Ok(None)` to signal a
/// retryable failure (its message has already been logged by the caller), or
/// `Err` for a fatal, non-retryable failure that aborts immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    config: RetryConfig,
    label: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..config.max_retries {
        if attempt > 0 {
            let delay = config.delay_for(attempt);
            debug!("{label}: retry attempt {attempt} after {}ms", delay.as_millis());
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("{label}: attempt {} failed: {e}", attempt + 1);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| VideoGenError::SlideGeneration(format!("{label}: exhausted retries"))))
}
