//! Exponential-backoff retry helper for worker-pool jobs talking to the LLM
//! backend. A job retries only on [`CoreError::is_retryable`] errors.

use crate::error::CoreResult;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let exponential = base_ms * self.backoff_multiplier.powi(attempt as i32);
        let capped = exponential.min(self.max_delay.as_millis() as f64);
        let jitter_range = capped * self.jitter_factor;
        let jitter = rand::thread_rng().gen::<f64>() * jitter_range;
        Duration::from_millis((capped + jitter - jitter_range / 2.0).max(0.0) as u64)
    }
}

/// Retries `operation` with exponential backoff, but only when the error
/// returned is [`CoreError::is_retryable`]; a non-retryable error returns
/// immediately.
pub async fn retry_with_backoff<F, Fut, T>(config: RetryConfig, mut operation: F) -> CoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
{
    let mut last_err = None;
    for attempt in 0..config.max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err.is_retryable();
                last_err = Some(err);
                if !retryable || attempt + 1 >= config.max_attempts {
                    break;
                }
                tokio::time::sleep(config.delay_for(attempt)).await;
            }
        }
    }
    Err(last_err.expect("at least one attempt always runs"))
}
