//! Token-bucket admission control.
//!
//! - [`TokenBucket`]: continuous-refill bucket
//! - [`TokenBucketRegistry`]: one bucket per client and policy class, swept when idle
//! - [`RateLimitPolicy`]: rate and burst for a policy class

mod bucket;
mod policy;
mod registry;

pub use bucket::TokenBucket;
pub use policy::{ClassPolicies, RateLimitPolicy};
pub use registry::{
    Admission, DEFAULT_IDLE_TIMEOUT, DEFAULT_SWEEP_INTERVAL, SweepReport, SweeperHandle,
    TokenBucketRegistry,
};
