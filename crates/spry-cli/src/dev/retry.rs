//! Retrying transient failures, such as rebinding a port that the previous
//! instance released a moment ago.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
pub const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(5);
pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

/// Bounded retry loop: stops at `max_attempts` tries or once `max_elapsed`
/// has passed, whichever comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_elapsed: Duration,
    /// Pause between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, max_elapsed: Duration, delay: Duration) -> Self {
        Self {
            max_attempts,
            max_elapsed,
            delay,
        }
    }

    /// Single attempt.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Run `op` until it succeeds, fails with an error `recoverable`
    /// rejects, or the policy is exhausted. The last error is returned.
    pub async fn run<T, E, F, Fut>(&self, mut op: F, recoverable: impl Fn(&E) -> bool) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let mut attempt = 1;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let exhausted = attempt >= self.max_attempts || start.elapsed() >= self.max_elapsed;
            if exhausted || !recoverable(&err) {
                return Err(err);
            }

            tracing::debug!(attempt, "retrying");
            attempt += 1;
            sleep(self.delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_ELAPSED, DEFAULT_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_secs(5), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Cell::new(0);
        let result: Result<u32, &str> = fast(5)
            .run(
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move { if n < 3 { Err("busy") } else { Ok(n) } }
                },
                |_| true,
            )
            .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn stops_at_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), &str> = fast(4)
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err("busy") }
                },
                |_| true,
            )
            .await;
        assert_eq!(result, Err("busy"));
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test]
    async fn unrecoverable_errors_fail_fast() {
        let calls = Cell::new(0);
        let result: Result<(), &str> = fast(10)
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err("denied") }
                },
                |err| *err == "busy",
            )
            .await;
        assert_eq!(result, Err("denied"));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn elapsed_budget_ends_retries() {
        let policy = RetryPolicy::new(1000, Duration::from_millis(20), Duration::from_millis(5));
        let calls = Cell::new(0);
        let result: Result<(), &str> = policy
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err("busy") }
                },
                |_| true,
            )
            .await;
        assert!(result.is_err());
        assert!(calls.get() < 1000);
    }

    #[tokio::test]
    async fn none_is_one_attempt() {
        let calls = Cell::new(0);
        let _ = RetryPolicy::none()
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err::<(), _>("busy") }
                },
                |_| true,
            )
            .await;
        assert_eq!(calls.get(), 1);
    }
}
