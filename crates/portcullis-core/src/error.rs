//! Error types for Portcullis.
//!
//! Admission rejections are not errors: they are a regular outcome of
//! [`TokenBucketRegistry::acquire`](crate::limiter::TokenBucketRegistry::acquire).
//! The types here cover invalid configuration, which is detected once at
//! startup, and failures reported by an external cache store.
//!
//! # Example
//!
//! ```
//! use portcullis_core::{PortcullisError, Result};
//!
//! fn check_burst(burst: u32) -> Result<u32> {
//!     if burst == 0 {
//!         return Err(PortcullisError::invalid_policy("burst", "must be at least 1"));
//!     }
//!     Ok(burst)
//! }
//!
//! assert!(check_burst(0).is_err());
//! ```

use thiserror::Error;

/// Main error type for Portcullis configuration and policy handling.
#[derive(Debug, Error)]
pub enum PortcullisError {
    /// A rate-limit or cache policy value is out of range.
    #[error("Invalid policy field '{field}': {reason}")]
    InvalidPolicy {
        /// Field that failed validation
        field: String,
        /// Why it's invalid
        reason: String,
    },

    /// A path or invalidation pattern cannot be used.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as provided
        pattern: String,
        /// Why it's invalid
        reason: String,
    },
}

impl PortcullisError {
    /// Creates an InvalidPolicy error.
    pub fn invalid_policy(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an InvalidPattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// Type alias for Results with PortcullisError.
pub type Result<T> = std::result::Result<T, PortcullisError>;
