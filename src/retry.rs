//! Bounded retry with fixed or exponential delay
//!
//! Used by ingestor fetches; the streaming driver applies its own
//! capped exponential variant on reconnect.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffMode {
    Fixed,
    Exponential,
}

/// Retry parameters: total attempts, base delay and backoff law.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_millis: u64,
    pub mode: BackoffMode,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_millis: 500,
            mode: BackoffMode::Exponential,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay_millis: u64) -> Self {
        Self {
            max_attempts,
            delay_millis,
            mode: BackoffMode::Fixed,
        }
    }

    pub fn exponential(max_attempts: u32, delay_millis: u64) -> Self {
        Self {
            max_attempts,
            delay_millis,
            mode: BackoffMode::Exponential,
        }
    }

    /// Delay before the retry that follows `attempt` (1-based):
    /// fixed, or delay * 2^(attempt-1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let millis = match self.mode {
            BackoffMode::Fixed => self.delay_millis,
            BackoffMode::Exponential => {
                let shift = attempt.saturating_sub(1).min(32);
                self.delay_millis.saturating_mul(1u64 << shift)
            }
        };
        Duration::from_millis(millis)
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping between
/// failures. The last error propagates after the final attempt.
pub async fn retry_async<T, E, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => {
                warn!(label, attempt, error = %err, "giving up after final attempt");
                return Err(err);
            }
            Err(err) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
