//! Linear retry backoff
//!
//! Clone retries and rate-limited API calls share one small state machine:
//! `Attempting(n) -> Succeeded | Retrying(delay) -> Attempting(n + 1) | Exhausted`.
//! The delay before attempt `n + 1` is `n * step`, never exponential.

use std::future::Future;
use std::time::Duration;

/// Attempts made before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Unit of the linear delay between attempts
pub const DEFAULT_RETRY_STEP: Duration = Duration::from_secs(1);

/// Position of an operation within its retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// About to run the given 1-based attempt
    Attempting(u32),
    /// The attempt failed; wait `delay` before the next one
    Retrying { attempt: u32, delay: Duration },
    /// The attempt succeeded
    Succeeded { attempts: u32 },
    /// Every attempt failed
    Exhausted { attempts: u32 },
}

impl RetryState {
    /// Leave the waiting state and start the next attempt
    pub fn resume(self) -> Self {
        match self {
            RetryState::Retrying { attempt, .. } => RetryState::Attempting(attempt + 1),
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryState::Succeeded { .. } | RetryState::Exhausted { .. }
        )
    }
}

/// Linear backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    max_attempts: u32,
    step: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::linear(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_STEP)
    }
}

impl Backoff {
    /// A policy allowing `max_attempts` tries (at least one) spaced `attempt * step` apart
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            step,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after the given failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.step * attempt
    }

    pub fn start(&self) -> RetryState {
        RetryState::Attempting(1)
    }

    /// Transition out of `Attempting(attempt)` once its outcome is known
    pub fn on_attempt(&self, attempt: u32, succeeded: bool) -> RetryState {
        if succeeded {
            RetryState::Succeeded { attempts: attempt }
        } else if attempt >= self.max_attempts {
            RetryState::Exhausted { attempts: attempt }
        } else {
            RetryState::Retrying {
                attempt,
                delay: self.delay_after(attempt),
            }
        }
    }

    /// Drive `op` through the state machine, starting at `Attempting(1)`.
    ///
    /// `op` receives the 1-based attempt number. Errors for which `should_retry`
    /// returns false end the loop immediately. `on_retry` is called with the
    /// failed attempt and the upcoming delay before each sleep. The last error
    /// is returned once the budget is exhausted.
    pub async fn run<T, E, F, Fut, W, N>(
        &self,
        mut op: F,
        should_retry: W,
        mut on_retry: N,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        W: Fn(&E) -> bool,
        N: FnMut(&E, u32, Duration),
    {
        let mut attempt = 1;

        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !should_retry(&err) {
                return Err(err);
            }

            match self.on_attempt(attempt, false) {
                state @ RetryState::Retrying { delay, .. } => {
                    on_retry(&err, attempt, delay);
                    tokio::time::sleep(delay).await;
                    if let RetryState::Attempting(next) = state.resume() {
                        attempt = next;
                    }
                }
                _ => return Err(err),
            }
        }
    }
}
