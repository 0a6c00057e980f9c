//! Fixed-schedule retry for a single fallible unit of work.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::Retryable;

/// Waits between attempts, in order. The last delay repeats if the policy
/// allows more attempts than there are delays.
pub const DEFAULT_DELAYS: [Duration; 5] = [
    Duration::from_secs(5),
    Duration::from_secs(10),
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(120),
];
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// The error of the last attempt and how many attempts were made.
#[derive(Debug, Error)]
#[error("{source} (after {attempts} attempt(s))")]
pub struct RetryError<E: std::error::Error + 'static> {
    pub attempts: usize,
    #[source]
    pub source: E,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
    max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays: DEFAULT_DELAYS.to_vec(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` is raised to 1; an empty `delays` retries immediately.
    pub fn new(delays: Vec<Duration>, max_attempts: usize) -> Self {
        Self {
            delays,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay after the `attempt`-th failure (1-based).
    pub fn delay_after(&self, attempt: usize) -> Duration {
        let idx = attempt.saturating_sub(1).min(self.delays.len().saturating_sub(1));
        self.delays.get(idx).copied().unwrap_or_default()
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// the attempts run out. `on_retry(attempt, delay, &error)` is called
    /// before each wait.
    pub async fn run<T, E, F, Fut, R>(
        &self,
        label: impl fmt::Display,
        mut op: F,
        mut on_retry: R,
    ) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + Retryable + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnMut(usize, Duration, &E),
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() || attempt >= self.max_attempts => {
                    return Err(RetryError {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        label, attempt, self.max_attempts, e, delay
                    );
                    on_retry(attempt, delay, &e);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn transient() -> SourceError {
        SourceError::parsing("missing title", "https://site.example/1")
    }

    #[test]
    fn test_delay_clamps_to_last() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
        assert_eq!(policy.delay_after(4), Duration::from_secs(60));
        assert_eq!(policy.delay_after(9), Duration::from_secs(120));
        assert_eq!(RetryPolicy::new(Vec::new(), 3).delay_after(2), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_four_failures() {
        let policy = RetryPolicy::default();
        let calls = AtomicUsize::new(0);
        let mut waits = Vec::new();
        let start = Instant::now();

        let value = policy
            .run(
                "chapter 1",
                || async {
                    if calls.fetch_add(1, Ordering::SeqCst) < 4 {
                        Err(transient())
                    } else {
                        Ok(42)
                    }
                },
                |_, delay, _| waits.push(delay.as_secs()),
            )
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(waits, vec![5, 10, 30, 60]);
        assert!(start.elapsed() >= Duration::from_secs(105));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy::default();
        let calls = AtomicUsize::new(0);

        let err = policy
            .run(
                "chapter 2",
                || async {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Err::<(), _>(SourceError::parsing(format!("attempt {}", n), "u"))
                },
                |_, _, _| {},
            )
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(err.source.to_string().contains("attempt 5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_is_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicUsize::new(0);
        let start = Instant::now();

        let err = policy
            .run(
                "chapter 3",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(SourceError::EmptyContent("u".into()))
                },
                |_, _, _| panic!("must not retry"),
            )
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
