//! # Portcullis Core
//!
//! Building blocks for the Portcullis gateway: per-client token-bucket
//! admission control and an HTTP response cache over a pluggable store.
//!
//! The crate is transport-agnostic. It works on `http` types and leaves
//! request plumbing to the server crate.
//!
//! ## Example
//!
//! ```
//! use portcullis_core::{ClassPolicies, ClientId, RateLimitClassifier, TokenBucketRegistry};
//!
//! let classifier = RateLimitClassifier::default();
//! let registry = TokenBucketRegistry::new(ClassPolicies::default());
//! let client = ClientId::new("203.0.113.9");
//!
//! let class = classifier.classify("/auth/login");
//! let admission = registry.acquire(&client, class);
//! assert!(admission.allowed);
//! assert_eq!(admission.remaining, 2);
//! ```

pub mod cache;
pub mod classify;
pub mod client;
pub mod error;
pub mod limiter;

pub use cache::{
    CacheDecision, CacheEntry, CacheKeyBuilder, CachePolicy, CachePolicyTable, CacheRoute,
    CacheStore, ResponseCache, ResponseCacheConfig, StoreError, StoreMetrics,
};
pub use classify::{PolicyClass, RateLimitClassifier};
pub use client::ClientId;
pub use error::{PortcullisError, Result};
pub use limiter::{
    Admission, ClassPolicies, RateLimitPolicy, SweepReport, SweeperHandle, TokenBucketRegistry,
};
