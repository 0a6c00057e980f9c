//! Token bucket state for one rate-limit window.

use std::time::Duration;

use tokio::time::Instant;

/// Permits left in the current window.
#[derive(Debug, Clone)]
pub struct WindowState {
    /// Start of the current window; `None` until the first request.
    pub window_start: Option<Instant>,
    /// Permits still available in the current window.
    pub tokens: u32,
    /// Permits handed out over the limiter's lifetime.
    pub granted: u64,
    /// Times a caller found the bucket empty and had to sleep.
    pub waits: u64,
}

impl WindowState {
    pub fn new(max_rate: u32) -> Self {
        Self {
            window_start: None,
            tokens: max_rate,
            granted: 0,
            waits: 0,
        }
    }

    /// Move to the window containing `now`, refilling the bucket if a
    /// boundary was crossed.
    pub fn advance(&mut self, now: Instant, period: Duration, max_rate: u32) {
        let start = match self.window_start {
            Some(start) => start,
            None => {
                self.window_start = Some(now);
                self.tokens = max_rate;
                return;
            }
        };

        let elapsed = now.saturating_duration_since(start);
        if elapsed < period {
            return;
        }

        let windows = (elapsed.as_nanos() / period.as_nanos().max(1)) as u32;
        self.window_start = Some(start + period * windows);
        self.tokens = max_rate;
    }

    /// Take one permit, or report how long to wait for the next window.
    pub fn try_take(&mut self, now: Instant, period: Duration) -> Result<(), Duration> {
        if self.tokens > 0 {
            self.tokens -= 1;
            self.granted += 1;
            return Ok(());
        }
        let start = self.window_start.unwrap_or(now);
        Err((start + period).saturating_duration_since(now))
    }
}
