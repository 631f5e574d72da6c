//! Per-client token bucket registry with idle eviction.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info};

use super::bucket::TokenBucket;
use super::policy::ClassPolicies;
use crate::classify::PolicyClass;
use crate::client::ClientId;

/// Buckets idle longer than this are evicted by the sweeper.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

type BucketKey = (ClientId, PolicyClass);

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Whether a token was available.
    pub allowed: bool,
    /// Whole tokens left after this check.
    pub remaining: u32,
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: usize,
    pub remaining: usize,
}

#[derive(Debug)]
struct ClientBucket {
    bucket: TokenBucket,
    last_access: Instant,
}

impl ClientBucket {
    fn acquire(&mut self, now: Instant) -> Admission {
        if now > self.last_access {
            self.last_access = now;
        }
        let allowed = self.bucket.try_consume(now);
        Admission {
            allowed,
            remaining: self.bucket.remaining(),
        }
    }
}

/// Owns one [`TokenBucket`] per `(client, class)` pair.
///
/// Lookups and token consumption take the shared lock; only bucket creation
/// and sweeping take the exclusive lock. Each bucket sits behind its own
/// mutex so concurrent clients never contend on the same token count.
///
/// # Example
///
/// ```
/// use portcullis_core::{ClassPolicies, ClientId, PolicyClass, TokenBucketRegistry};
///
/// let registry = TokenBucketRegistry::new(ClassPolicies::default());
/// let client = ClientId::new("203.0.113.7");
///
/// let admission = registry.acquire(&client, PolicyClass::Sensitive);
/// assert!(admission.allowed);
/// assert_eq!(admission.remaining, 2);
/// ```
#[derive(Debug)]
pub struct TokenBucketRegistry {
    buckets: RwLock<HashMap<BucketKey, Mutex<ClientBucket>>>,
    policies: ClassPolicies,
    idle_timeout: Duration,
}

impl TokenBucketRegistry {
    /// Creates an empty registry with the default idle timeout.
    pub fn new(policies: ClassPolicies) -> Self {
        Self::with_idle_timeout(policies, DEFAULT_IDLE_TIMEOUT)
    }

    /// Creates an empty registry evicting buckets idle for longer than `idle_timeout`.
    pub fn with_idle_timeout(policies: ClassPolicies, idle_timeout: Duration) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            policies,
            idle_timeout,
        }
    }

    /// Takes one token for `(client, class)`, creating the bucket on first use.
    pub fn acquire(&self, client: &ClientId, class: PolicyClass) -> Admission {
        let key = (client.clone(), class);

        {
            let buckets = self.buckets.read();
            if let Some(entry) = buckets.get(&key) {
                return entry.lock().acquire(Instant::now());
            }
        }

        let mut buckets = self.buckets.write();
        // Another caller may have inserted while we waited for the write lock.
        let now = Instant::now();
        let policy = self.policies.for_class(class);
        let entry = buckets.entry(key).or_insert_with(|| {
            debug!(client = %client, class = %class, "Creating rate-limit bucket");
            Mutex::new(ClientBucket {
                bucket: TokenBucket::new(policy.rate_per_second(), policy.burst, now),
                last_access: now,
            })
        });
        entry.get_mut().acquire(now)
    }

    /// Removes buckets idle for longer than the idle timeout.
    ///
    /// Returns the number of evicted buckets.
    pub fn sweep_idle(&self) -> usize {
        self.sweep_idle_at(Instant::now())
    }

    fn sweep_idle_at(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.write();
        let before = buckets.len();
        let idle_timeout = self.idle_timeout;

        buckets.retain(|_, entry| {
            now.saturating_duration_since(entry.get_mut().last_access) <= idle_timeout
        });

        let evicted = before - buckets.len();
        if evicted > 0 {
            info!(
                evicted = evicted,
                remaining = buckets.len(),
                "Evicted idle rate-limit buckets"
            );
        } else {
            debug!(remaining = buckets.len(), "No idle rate-limit buckets to evict");
        }
        evicted
    }

    /// Starts the background sweep task.
    ///
    /// The task holds only a weak reference, so it ends by itself once the
    /// registry is dropped. Dropping or stopping the returned handle ends it
    /// earlier.
    pub fn start_sweeper(self: &Arc<Self>, every: Duration) -> SweeperHandle {
        self.start_sweeper_with(every, |_| {})
    }

    /// Like [`start_sweeper`](Self::start_sweeper), calling `on_sweep` after every pass.
    pub fn start_sweeper_with<F>(self: &Arc<Self>, every: Duration, on_sweep: F) -> SweeperHandle
    where
        F: Fn(SweepReport) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_sweeper(
            Arc::downgrade(self),
            every,
            shutdown_rx,
            on_sweep,
        ));

        SweeperHandle {
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Returns the number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.read().len()
    }

    /// Returns true if no bucket exists.
    pub fn is_empty(&self) -> bool {
        self.buckets.read().is_empty()
    }

    /// Returns the configured class policies.
    pub fn policies(&self) -> &ClassPolicies {
        &self.policies
    }

    /// Returns the idle eviction threshold.
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

async fn run_sweeper<F>(
    registry: Weak<TokenBucketRegistry>,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    on_sweep: F,
) where
    F: Fn(SweepReport),
{
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;

    info!("Starting rate-limit sweeper with interval {:?}", every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(registry) = registry.upgrade() else {
                    debug!("Registry dropped, rate-limit sweeper exiting");
                    break;
                };
                let evicted = registry.sweep_idle();
                on_sweep(SweepReport {
                    evicted,
                    remaining: registry.len(),
                });
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    info!("Rate-limit sweeper shutting down");
                    break;
                }
            }
        }
    }
}

/// Handle for controlling a running sweeper.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Signals the sweeper to stop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stops the sweeper and waits for the task to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Returns true once the sweep task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
