//! Rate-limit policies per class.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::PolicyClass;
use crate::error::{PortcullisError, Result};

/// Token-bucket parameters for one policy class.
///
/// `requests` tokens are added every `window`, at most `burst` are held.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use portcullis_core::RateLimitPolicy;
///
/// let policy = RateLimitPolicy::new(100, Duration::from_secs(60), 10);
/// assert!((policy.rate_per_second() - 100.0 / 60.0).abs() < f64::EPSILON);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Requests allowed per window.
    pub requests: u32,
    /// Window length.
    #[serde(with = "duration_secs")]
    pub window: Duration,
    /// Bucket capacity.
    pub burst: u32,
}

impl RateLimitPolicy {
    /// Creates a policy.
    pub fn new(requests: u32, window: Duration, burst: u32) -> Self {
        Self {
            requests,
            window,
            burst,
        }
    }

    /// Default policy for general endpoints: 100 per minute, burst 10.
    pub fn general() -> Self {
        Self::new(100, Duration::from_secs(60), 10)
    }

    /// Default policy for sensitive endpoints: 10 per minute, burst 3.
    pub fn sensitive() -> Self {
        Self::new(10, Duration::from_secs(60), 3)
    }

    /// Returns the refill rate in tokens per second.
    pub fn rate_per_second(&self) -> f64 {
        f64::from(self.requests) / self.window.as_secs_f64()
    }

    /// Returns the window in whole seconds, used as the retry hint.
    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }

    /// Checks that the policy can build a usable bucket.
    pub fn validate(&self, field: &str) -> Result<()> {
        if self.requests == 0 {
            return Err(PortcullisError::invalid_policy(
                format!("{field}.requests"),
                "must be at least 1",
            ));
        }
        if self.burst == 0 {
            return Err(PortcullisError::invalid_policy(
                format!("{field}.burst"),
                "must be at least 1",
            ));
        }
        if self.window < Duration::from_secs(1) {
            return Err(PortcullisError::invalid_policy(
                format!("{field}.window"),
                "must be at least one second",
            ));
        }
        Ok(())
    }
}

/// Policies for every [`PolicyClass`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassPolicies {
    pub general: RateLimitPolicy,
    pub sensitive: RateLimitPolicy,
}

impl ClassPolicies {
    /// Returns the policy for a class.
    pub fn for_class(&self, class: PolicyClass) -> &RateLimitPolicy {
        match class {
            PolicyClass::General => &self.general,
            PolicyClass::Sensitive => &self.sensitive,
        }
    }

    /// Validates every class policy.
    pub fn validate(&self) -> Result<()> {
        self.general.validate("general")?;
        self.sensitive.validate("sensitive")
    }
}

impl Default for ClassPolicies {
    fn default() -> Self {
        Self {
            general: RateLimitPolicy::general(),
            sensitive: RateLimitPolicy::sensitive(),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
