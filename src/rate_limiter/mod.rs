//! Global request rate limiter.
//!
//! A token bucket that grants at most `max_rate` permits per `time_period`.
//! The bucket is full when a window opens; callers that find it empty sleep
//! until the next window boundary. Every outgoing request takes a permit.

mod window;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use window::WindowState;

pub const DEFAULT_MAX_RATE: u32 = 20;
pub const DEFAULT_TIME_PERIOD: Duration = Duration::from_secs(10);

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Permits per window.
    pub max_rate: u32,
    /// Window length.
    pub time_period: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_rate: DEFAULT_MAX_RATE,
            time_period: DEFAULT_TIME_PERIOD,
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimiterStats {
    pub granted: u64,
    pub waits: u64,
}

/// Shared token bucket. Clones share the same bucket.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<Mutex<WindowState>>,
}

impl RateLimiter {
    /// Create a new rate limiter with default config.
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    /// Create a new rate limiter with custom config.
    pub fn with_config(config: RateLimitConfig) -> Self {
        let max_rate = config.max_rate.max(1);
        Self {
            config: RateLimitConfig { max_rate, ..config },
            state: Arc::new(Mutex::new(WindowState::new(max_rate))),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Wait until a permit is available and take it.
    ///
    /// The lock is released before sleeping, so a caller that wakes up at a
    /// window boundary competes with new arrivals; ordering is not FIFO.
    pub async fn acquire(&self) {
        let mut counted_wait = false;
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                state.advance(now, self.config.time_period, self.config.max_rate);
                match state.try_take(now, self.config.time_period) {
                    Ok(()) => return,
                    Err(wait) => {
                        if !counted_wait {
                            state.waits += 1;
                            counted_wait = true;
                        }
                        wait
                    }
                }
            };

            debug!("Rate limiting: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Drain the current window after the server answered 429.
    pub async fn report_rate_limit(&self, url: &str) {
        let mut state = self.state.lock().await;
        if state.tokens > 0 {
            warn!(
                "Rate limited by server at {}, pausing until the next window",
                url
            );
            state.tokens = 0;
        }
    }

    pub async fn stats(&self) -> RateLimiterStats {
        let state = self.state.lock().await;
        RateLimiterStats {
            granted: state.granted,
            waits: state.waits,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            state: self.state.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_rate: u32, secs: u64) -> RateLimiter {
        RateLimiter::with_config(RateLimitConfig {
            max_rate,
            time_period: Duration::from_secs(secs),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_within_window_is_immediate() {
        let limiter = limiter(5, 10);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.stats().await.waits, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_request_waits_for_next_window() {
        let limiter = limiter(3, 10);
        let start = Instant::now();
        for _ in 0..4 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_secs(10));
        let stats = limiter.stats().await;
        assert_eq!(stats.granted, 4);
        assert_eq!(stats.waits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_bucket() {
        let limiter = limiter(2, 10);
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                Instant::now()
            }));
        }

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap() - start);
        }
        finished.sort();

        assert_eq!(finished[0], Duration::ZERO);
        assert_eq!(finished[1], Duration::ZERO);
        assert!(finished[2] >= Duration::from_secs(10));
        assert!(finished[4] >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_report_drains_window() {
        let limiter = limiter(10, 10);
        limiter.acquire().await;
        limiter.report_rate_limit("https://a.example").await;

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(9));
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        assert_eq!(limiter(0, 1).config().max_rate, 1);
    }
}
