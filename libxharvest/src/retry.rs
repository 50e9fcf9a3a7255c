//! Bounded retry with a fixed delay
//!
//! Every failure is retried the same way: wait `delay`, try again, give up
//! after `attempts` tries and hand back the last error. There is no jitter
//! and no exponential growth.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of tries, including the first one. Never below 1.
    pub attempts: u32,
    /// Wait between a failed try and the next one
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn from_secs(attempts: u32, delay_secs: u64) -> Self {
        Self::new(attempts, Duration::from_secs(delay_secs))
    }

    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// The closure receives the 1-based attempt number. On exhaustion the
    /// error from the final attempt is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} succeeded on attempt {}/{}", label, attempt, attempts);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!("{} attempt {}/{} failed: {}", label, attempt, attempts, e);
                    if attempt >= attempts {
                        return Err(e);
                    }
                    info!("Retrying in {} seconds...", self.delay.as_secs_f64());
                    sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
