//! Request budget per rolling window
//!
//! One [`RateLimiter`] per client instance. A request reserves one unit of
//! budget before it is sent; provider headers, when present, overwrite the
//! local estimate with the authoritative numbers.

use crate::error::ClientError;
use crate::transport::ProviderReply;
use chrono::{DateTime, Duration, Utc};
use mediaref_store::SharedClock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Header carrying the window's request limit
pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
/// Header carrying requests left in the window
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
/// Header carrying seconds until the window resets
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Budget configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Requests allowed per window
    pub limit: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl RateLimitPolicy {
    /// Window as a duration
    #[inline]
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::seconds(i64::try_from(self.window_secs).unwrap_or(i64::MAX / 1_000))
    }
}

impl Default for RateLimitPolicy {
    /// 100 requests per 60 seconds
    fn default() -> Self {
        Self {
            limit: 100,
            window_secs: 60,
        }
    }
}

/// Budget bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    /// Requests allowed per window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the current window ends
    pub window_reset_at: DateTime<Utc>,
}

/// Rate-limit values reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
    /// Window limit
    pub limit: Option<u32>,
    /// Remaining requests
    pub remaining: Option<u32>,
    /// Seconds until reset
    pub reset_secs: Option<u64>,
}

impl RateLimitHeaders {
    /// Read rate-limit headers from a reply
    #[must_use]
    pub fn from_reply(reply: &ProviderReply) -> Self {
        Self {
            limit: reply.header(HEADER_LIMIT).and_then(|v| v.trim().parse().ok()),
            remaining: reply
                .header(HEADER_REMAINING)
                .and_then(|v| v.trim().parse().ok()),
            reset_secs: reply.header(HEADER_RESET).and_then(|v| v.trim().parse().ok()),
        }
    }

    /// Check if any value was present
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.remaining.is_none() && self.reset_secs.is_none()
    }
}

/// Shared request budget
#[derive(Debug)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    state: Mutex<RateLimitState>,
    clock: SharedClock,
}

impl RateLimiter {
    /// Create limiter with a full budget
    #[must_use]
    pub fn new(policy: RateLimitPolicy, clock: SharedClock) -> Self {
        let state = RateLimitState {
            limit: policy.limit,
            remaining: policy.limit,
            window_reset_at: clock.now() + policy.window(),
        };
        Self {
            policy,
            state: Mutex::new(state),
            clock,
        }
    }

    /// Reserve one request from the budget
    ///
    /// Rolls the window over first if it has ended.
    ///
    /// # Errors
    /// Returns `ClientError::RateLimited` with seconds until reset when the
    /// budget is exhausted
    pub fn acquire(&self) -> Result<(), ClientError> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if now >= state.window_reset_at {
            state.remaining = state.limit;
            state.window_reset_at = now + self.policy.window();
            tracing::debug!(limit = state.limit, "rate-limit window reset");
        }
        if state.remaining == 0 {
            let retry_after_secs = seconds_until(now, state.window_reset_at);
            tracing::debug!(retry_after_secs, "rate limit exhausted");
            return Err(ClientError::RateLimited { retry_after_secs });
        }
        state.remaining -= 1;
        Ok(())
    }

    /// Apply provider-reported values; without headers the reservation made
    /// by [`acquire`](Self::acquire) stands as the local estimate
    pub fn observe(&self, headers: &RateLimitHeaders) {
        if headers.is_empty() {
            return;
        }
        let now = self.clock.now();
        let mut state = self.state.lock();
        if let Some(limit) = headers.limit {
            state.limit = limit;
        }
        if let Some(remaining) = headers.remaining {
            state.remaining = remaining.min(state.limit);
        }
        if let Some(reset) = headers.reset_secs {
            state.window_reset_at = now + Duration::seconds(i64::try_from(reset).unwrap_or(0));
        }
    }

    /// Provider refused for rate reasons: zero the budget until reset
    ///
    /// Returns the seconds until the window resets.
    pub fn exhaust(&self, reset_secs: Option<u64>) -> u64 {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.remaining = 0;
        if let Some(reset) = reset_secs {
            state.window_reset_at = now + Duration::seconds(i64::try_from(reset).unwrap_or(0));
        }
        seconds_until(now, state.window_reset_at)
    }

    /// Current bookkeeping
    #[must_use]
    pub fn snapshot(&self) -> RateLimitState {
        *self.state.lock()
    }

    /// Configured policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }
}

/// Whole seconds from `now` to `at`, rounded up, at least 1
fn seconds_until(now: DateTime<Utc>, at: DateTime<Utc>) -> u64 {
    let millis = (at - now).num_milliseconds().max(0);
    let secs = u64::try_from(millis).unwrap_or(0).div_ceil(1_000);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaref_store::{Clock, ManualClock};
    use std::sync::Arc;

    fn limiter(limit: u32) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = RateLimiter::new(
            RateLimitPolicy {
                limit,
                window_secs: 60,
            },
            clock.clone(),
        );
        (limiter, clock)
    }

    #[test]
    fn budget_is_consumed_then_refused() {
        let (limiter, _clock) = limiter(2);
        limiter.acquire().unwrap();
        limiter.acquire().unwrap();

        let err = limiter.acquire().unwrap_err();
        assert_eq!(err, ClientError::RateLimited { retry_after_secs: 60 });
        assert_eq!(limiter.snapshot().remaining, 0);
    }

    #[test]
    fn window_rolls_over() {
        let (limiter, clock) = limiter(1);
        limiter.acquire().unwrap();
        assert!(limiter.acquire().is_err());

        clock.advance(Duration::seconds(30));
        assert_eq!(
            limiter.acquire().unwrap_err(),
            ClientError::RateLimited { retry_after_secs: 30 }
        );

        clock.advance(Duration::seconds(30));
        limiter.acquire().unwrap();
        assert_eq!(limiter.snapshot().remaining, 0);
    }

    #[test]
    fn headers_override_local_estimate() {
        let (limiter, clock) = limiter(100);
        limiter.acquire().unwrap();
        limiter.observe(&RateLimitHeaders {
            limit: Some(100),
            remaining: Some(7),
            reset_secs: Some(12),
        });

        let state = limiter.snapshot();
        assert_eq!(state.remaining, 7);
        assert_eq!(state.window_reset_at, clock.now() + Duration::seconds(12));
    }

    #[test]
    fn missing_headers_keep_reservation() {
        let (limiter, _clock) = limiter(5);
        limiter.acquire().unwrap();
        limiter.observe(&RateLimitHeaders::default());
        assert_eq!(limiter.snapshot().remaining, 4);
    }

    #[test]
    fn exhaust_zeroes_budget() {
        let (limiter, _clock) = limiter(5);
        assert_eq!(limiter.exhaust(Some(9)), 9);
        assert_eq!(
            limiter.acquire().unwrap_err(),
            ClientError::RateLimited { retry_after_secs: 9 }
        );
    }

    #[test]
    fn parses_headers_from_reply() {
        let reply = ProviderReply::new(200, "{}")
            .with_header("X-RateLimit-Limit", "100")
            .with_header("X-RateLimit-Remaining", "98")
            .with_header("X-RateLimit-Reset", "41");
        let headers = RateLimitHeaders::from_reply(&reply);
        assert_eq!(headers.limit, Some(100));
        assert_eq!(headers.remaining, Some(98));
        assert_eq!(headers.reset_secs, Some(41));

        let none = RateLimitHeaders::from_reply(&ProviderReply::new(200, "{}"));
        assert!(none.is_empty());
    }

    #[test]
    fn rounding_up_partial_seconds() {
        let now = Utc::now();
        assert_eq!(seconds_until(now, now + Duration::milliseconds(1_500)), 2);
        assert_eq!(seconds_until(now, now - Duration::seconds(3)), 1);
    }
}
