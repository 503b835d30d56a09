//! Rate limiting and adaptive throttling for the 115 open-platform API
//!
//! 115's API terms cap each app at a flat requests-per-second ceiling
//! (default 2) rather than a per-endpoint budget. One [`TokenBucket`] per
//! client is therefore enough; there is no per-endpoint-category map to
//! manage.
//!
//! ## Architecture
//!
//! - [`TokenBucket`]: classic token bucket algorithm, with adaptive capacity
//!   adjustment based on server responses (429 throttle / success)
//! - [`RateLimiter`]: owns one bucket and the retry budget for a client
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gateway_drive115::rate_limit::{RateLimiter, RateLimitConfig};
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(RateLimitConfig::default());
//! limiter.acquire().await;
//! // ... make API call ...
//! limiter.on_success();
//! # }
//! ```

use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

/// Internal mutable state for the token bucket, protected by a Mutex.
#[derive(Debug)]
struct TokenBucketInner {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter.
///
/// Tokens are consumed on each request and refilled at a constant rate.
/// When no tokens are available, callers must wait for refill.
#[derive(Debug)]
pub struct TokenBucket {
    effective_capacity: Mutex<u32>,
    refill_rate: f64,
    inner: Mutex<TokenBucketInner>,
    success_count: Mutex<u64>,
    original_capacity: u32,
}

impl TokenBucket {
    /// Creates a new `TokenBucket`, starting full.
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            effective_capacity: Mutex::new(capacity),
            refill_rate,
            inner: Mutex::new(TokenBucketInner {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
            success_count: Mutex::new(0),
            original_capacity: capacity,
        }
    }

    fn refill(inner: &mut TokenBucketInner, refill_rate: f64, effective_capacity: u32) {
        let now = Instant::now();
        let elapsed_secs = now.duration_since(inner.last_refill).as_secs_f64();
        if elapsed_secs > 0.0 {
            let new_tokens = elapsed_secs * refill_rate;
            inner.tokens = (inner.tokens + new_tokens).min(effective_capacity as f64);
            inner.last_refill = now;
        }
    }

    /// Attempts to acquire a single token without blocking.
    pub fn try_acquire(&self) -> bool {
        let effective_cap = *self.effective_capacity.lock().unwrap();
        let mut inner = self.inner.lock().unwrap();
        Self::refill(&mut inner, self.refill_rate, effective_cap);

        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Estimated wait time in seconds until a token becomes available.
    pub fn time_until_available(&self) -> f64 {
        let effective_cap = *self.effective_capacity.lock().unwrap();
        let mut inner = self.inner.lock().unwrap();
        Self::refill(&mut inner, self.refill_rate, effective_cap);

        if inner.tokens >= 1.0 {
            0.0
        } else {
            let deficit = 1.0 - inner.tokens;
            if self.refill_rate > 0.0 {
                deficit / self.refill_rate
            } else {
                f64::MAX
            }
        }
    }

    pub fn available_tokens(&self) -> f64 {
        let effective_cap = *self.effective_capacity.lock().unwrap();
        let mut inner = self.inner.lock().unwrap();
        Self::refill(&mut inner, self.refill_rate, effective_cap);
        inner.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.original_capacity
    }

    pub fn effective_capacity(&self) -> u32 {
        *self.effective_capacity.lock().unwrap()
    }

    /// Records a success; every 100 consecutive successes the effective
    /// capacity grows 5% toward the original, undoing a past throttle.
    pub fn on_success(&self) {
        let mut count = self.success_count.lock().unwrap();
        *count += 1;

        if *count % 100 == 0 {
            let mut eff_cap = self.effective_capacity.lock().unwrap();
            if *eff_cap < self.original_capacity {
                let increase = (*eff_cap as f64 * 0.05).max(1.0) as u32;
                let new_cap = (*eff_cap + increase).min(self.original_capacity);
                debug!(old_capacity = *eff_cap, new_capacity = new_cap, "adaptive recovery");
                *eff_cap = new_cap;
            }
        }
    }

    /// Records a 429 and halves the effective capacity (floor 1).
    pub fn on_throttle(&self) {
        let mut eff_cap = self.effective_capacity.lock().unwrap();
        let old = *eff_cap;
        *eff_cap = (*eff_cap / 2).max(1);
        warn!(old_capacity = old, new_capacity = *eff_cap, "throttle detected");

        let mut count = self.success_count.lock().unwrap();
        *count = 0;
    }
}

/// Guard returned after acquiring a token. The bucket already subtracted
/// the token on acquisition; this is a marker for future extension.
#[derive(Debug)]
pub struct RateLimitGuard;

/// Configuration for a [`RateLimiter`].
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Bucket capacity (tokens), also the steady-state requests/second.
    pub capacity: u32,
    /// Tokens added per second.
    pub refill_rate: f64,
    /// Maximum retries on a 429 response.
    pub max_retries: u32,
}

impl Default for RateLimitConfig {
    /// 115's open-platform default: 2 requests/second.
    fn default() -> Self {
        Self {
            capacity: 2,
            refill_rate: 2.0,
            max_retries: 5,
        }
    }
}

/// Per-client rate limiter wrapping a single [`TokenBucket`].
pub struct RateLimiter {
    bucket: TokenBucket,
    max_retries: u32,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            bucket: TokenBucket::new(config.capacity, config.refill_rate),
            max_retries: config.max_retries,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Acquires a token, sleeping until one is available.
    pub async fn acquire(&self) -> RateLimitGuard {
        loop {
            if self.bucket.try_acquire() {
                return RateLimitGuard;
            }
            let wait = Duration::from_secs_f64(self.bucket.time_until_available().max(0.01));
            debug!(wait_ms = wait.as_millis(), "no tokens available, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    pub fn on_success(&self) {
        self.bucket.on_success();
    }

    pub fn on_throttle(&self) {
        self.bucket.on_throttle();
    }

    pub fn effective_capacity(&self) -> u32 {
        self.bucket.effective_capacity()
    }
}

/// Parses a `Retry-After` header value into a `Duration`.
///
/// Accepts either an integer number of seconds or an HTTP-date, falling
/// back to `default` if parsing fails.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        if target > now {
            let diff = target - now;
            if let Some(secs) = diff.num_seconds().try_into().ok().filter(|&s: &u64| s <= 3600) {
                return Duration::from_secs(secs);
            }
        }
    }

    warn!(value, "could not parse Retry-After header, using default");
    default
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_starts_full_and_drains() {
        let bucket = TokenBucket::new(2, 2.0);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn on_throttle_halves_capacity_with_floor_one() {
        let bucket = TokenBucket::new(4, 1.0);
        bucket.on_throttle();
        assert_eq!(bucket.effective_capacity(), 2);
        bucket.on_throttle();
        assert_eq!(bucket.effective_capacity(), 1);
        bucket.on_throttle();
        assert_eq!(bucket.effective_capacity(), 1);
    }

    #[test]
    fn on_success_recovers_after_throttle() {
        let bucket = TokenBucket::new(100, 1.0);
        bucket.on_throttle();
        assert_eq!(bucket.effective_capacity(), 50);
        for _ in 0..100 {
            bucket.on_success();
        }
        assert!(bucket.effective_capacity() > 50);
    }

    #[tokio::test]
    async fn acquire_waits_for_refill() {
        let limiter = RateLimiter::new(RateLimitConfig {
            capacity: 1,
            refill_rate: 100.0,
            max_retries: 3,
        });
        let _g1 = limiter.acquire().await;
        let start = Instant::now();
        let _g2 = limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("30", Duration::from_secs(60)), Duration::from_secs(30));
    }

    #[test]
    fn parse_retry_after_invalid_falls_back() {
        let default = Duration::from_secs(60);
        assert_eq!(parse_retry_after("nope", default), default);
    }
}
