//! Continuous-refill token bucket.

use tokio::time::Instant;

/// Slack absorbed when comparing against a whole token, so that waiting
/// exactly `1 / rate` seconds always yields one token despite float rounding.
const TOKEN_EPSILON: f64 = 1e-9;

/// A token bucket with time-proportional refill.
///
/// Invariant: `0 <= available <= burst`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Tokens added per second.
    rate: f64,
    /// Maximum number of tokens held.
    burst: f64,
    /// Tokens currently available.
    available: f64,
    /// Last time refill was applied.
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a full bucket.
    pub fn new(rate: f64, burst: u32, now: Instant) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate: rate.max(0.0),
            burst,
            available: burst,
            last_refill: now,
        }
    }

    /// Refills for the time elapsed since the last call and tries to take one token.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.available + TOKEN_EPSILON >= 1.0 {
            self.available = (self.available - 1.0).max(0.0);
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        if now <= self.last_refill {
            return;
        }
        let elapsed = now.duration_since(self.last_refill);
        self.available = (self.available + elapsed.as_secs_f64() * self.rate).min(self.burst);
        self.last_refill = now;
    }

    /// Returns the whole tokens currently available, never negative.
    pub fn remaining(&self) -> u32 {
        (self.available + TOKEN_EPSILON).floor().max(0.0) as u32
    }

    /// Returns the raw token count.
    pub fn available(&self) -> f64 {
        self.available
    }

    /// Returns the bucket capacity.
    pub fn burst(&self) -> f64 {
        self.burst
    }

    /// Returns the refill rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }
}
