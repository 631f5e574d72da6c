//! Admission control across clients, classes and threads.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use portcullis_core::{
    ClassPolicies, ClientId, PolicyClass, RateLimitClassifier, RateLimitPolicy,
    TokenBucketRegistry,
};

#[tokio::test(start_paused = true)]
async fn test_default_general_policy_allows_burst_of_ten() {
    let registry = TokenBucketRegistry::new(ClassPolicies::default());
    let client = ClientId::new("198.51.100.1");

    let remaining: Vec<u32> = (0..10)
        .map(|_| {
            let admission = registry.acquire(&client, PolicyClass::General);
            assert!(admission.allowed);
            admission.remaining
        })
        .collect();

    assert_eq!(remaining, vec![9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
    assert!(!registry.acquire(&client, PolicyClass::General).allowed);
}

#[tokio::test(start_paused = true)]
async fn test_login_path_gets_sensitive_burst() {
    let classifier = RateLimitClassifier::default();
    let registry = TokenBucketRegistry::new(ClassPolicies::default());
    let client = ClientId::new("198.51.100.2");
    let class = classifier.classify("/auth/login");

    let allowed = (0..4)
        .filter(|_| registry.acquire(&client, class).allowed)
        .count();

    assert_eq!(class, PolicyClass::Sensitive);
    assert_eq!(allowed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_clients_do_not_share_buckets() {
    let registry = TokenBucketRegistry::new(ClassPolicies::default());
    let a = ClientId::new("a");
    let b = ClientId::new("b");

    while registry.acquire(&a, PolicyClass::Sensitive).allowed {}

    let admission = registry.acquire(&b, PolicyClass::Sensitive);
    assert!(admission.allowed);
    assert_eq!(admission.remaining, 2);
}

#[tokio::test(start_paused = true)]
async fn test_refill_is_capped_at_burst() {
    let policies = ClassPolicies {
        general: RateLimitPolicy::new(60, Duration::from_secs(60), 4),
        ..ClassPolicies::default()
    };
    let registry = TokenBucketRegistry::new(policies);
    let client = ClientId::new("198.51.100.3");

    registry.acquire(&client, PolicyClass::General);
    tokio::time::advance(Duration::from_secs(3600)).await;

    let allowed = (0..10)
        .filter(|_| registry.acquire(&client, PolicyClass::General).allowed)
        .count();
    assert_eq!(allowed, 4);
}

#[tokio::test(start_paused = true)]
async fn test_sustained_rate_after_burst() {
    // 60 per minute: one token per second.
    let policies = ClassPolicies {
        general: RateLimitPolicy::new(60, Duration::from_secs(60), 2),
        ..ClassPolicies::default()
    };
    let registry = TokenBucketRegistry::new(policies);
    let client = ClientId::new("198.51.100.4");

    let mut allowed = 0;
    for _ in 0..20 {
        if registry.acquire(&client, PolicyClass::General).allowed {
            allowed += 1;
        }
        tokio::time::advance(Duration::from_millis(250)).await;
    }

    // Two from the burst plus one per elapsed second (4.75s of refill).
    assert_eq!(allowed, 6);
}

#[test]
fn test_concurrent_first_access_creates_one_bucket() {
    const THREADS: usize = 16;

    let registry = Arc::new(TokenBucketRegistry::new(ClassPolicies::default()));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry
                    .acquire(&ClientId::new("203.0.113.50"), PolicyClass::General)
                    .allowed
            })
        })
        .collect();

    let allowed = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|allowed| *allowed)
        .count();

    assert_eq!(registry.len(), 1);
    // Burst is 10; refill over the test's wall time is well under one token/s.
    assert!((10..=11).contains(&allowed), "allowed {allowed}");
}
