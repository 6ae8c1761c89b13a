use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;

/// Exponential backoff: `initial`, doubling per retry, never above `max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay before retry number `retry` (zero-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }

    pub fn schedule(&self, retries: u32) -> Vec<Duration> {
        (0..retries).map(|retry| self.delay(retry)).collect()
    }

    /// Honours `Retry-After` seconds on 429s, capped like any other delay and
    /// never shorter than the exponential delay for `retry`, so the schedule
    /// stays non-decreasing.
    pub(crate) fn next(
        &self,
        retry: u32,
        status: Option<StatusCode>,
        headers: Option<&HeaderMap>,
    ) -> Duration {
        let base = self.delay(retry);
        if status == Some(StatusCode::TOO_MANY_REQUESTS) {
            if let Some(value) = headers
                .and_then(|headers| headers.get("Retry-After"))
                .and_then(|v| v.to_str().ok())
            {
                if let Ok(seconds) = value.trim().parse::<u64>() {
                    return Duration::from_secs(seconds).min(self.max).max(base);
                }
            }
        }
        base
    }
}
