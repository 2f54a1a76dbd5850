use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use tracing::debug;

use crate::LimiterConfig;
use crate::Snapshot;
use crate::TokenBucket;
use crate::clock::Clock;
use crate::clock::Instant;

#[derive(Debug)]
struct Slot {
    bucket: Arc<TokenBucket>,
    last_seen: Instant,
}

/// A registry of token buckets, one per key.
///
/// Buckets are created lazily the first time a key is seen and share a
/// single capacity / refill policy.
///
/// ## Locking
///
/// The key map has its own lock which is held only for the lookup-or-insert.
/// It is released before the bucket's lock is taken, so the two are never
/// nested and traffic on one key never blocks another key beyond that brief
/// map access.
///
/// ## Growth
///
/// Buckets are never dropped implicitly. Long running processes that see an
/// open-ended set of keys should call [`Limiter::evict_idle`] periodically.
#[derive(Debug)]
pub struct Limiter {
    buckets: Mutex<HashMap<String, Slot>>,
    capacity: NonZeroUsize,
    refill_rate: usize,
    clock: Clock,
}

impl Limiter {
    /// Creates an empty registry.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Size of every bucket, i.e. the burst a key may consume at once.
    /// * `refill_rate` - Tokens credited to each bucket per whole elapsed second.
    pub fn new(capacity: NonZeroUsize, refill_rate: usize) -> Self {
        Self::with_clock(capacity, refill_rate, Clock::new())
    }

    /// Creates an empty registry whose buckets all read time from `clock`.
    pub fn with_clock(capacity: NonZeroUsize, refill_rate: usize, clock: Clock) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            capacity,
            refill_rate,
            clock,
        }
    }

    pub fn from_config(config: &LimiterConfig) -> Self {
        Self::new(config.capacity, config.refill_rate)
    }

    /// Returns the bucket for `key`, creating a full one if the key is new.
    ///
    /// Concurrent first accesses to the same key all observe the same bucket.
    pub fn get_or_create(&self, key: &str) -> Arc<TokenBucket> {
        let now = self.clock.now();
        let mut buckets = self.lock();

        if let Some(slot) = buckets.get_mut(key) {
            slot.last_seen = now;
            return Arc::clone(&slot.bucket);
        }

        debug!(
            key,
            capacity = self.capacity.get(),
            refill_rate = self.refill_rate,
            "creating bucket"
        );
        let bucket = Arc::new(TokenBucket::with_clock(
            self.capacity,
            self.refill_rate,
            self.clock.clone(),
        ));
        buckets.insert(
            key.to_owned(),
            Slot {
                bucket: Arc::clone(&bucket),
                last_seen: now,
            },
        );
        bucket
    }

    /// Attempts to admit a single request for `key`.
    pub fn allow(&self, key: &str) -> bool {
        self.get_or_create(key).take(1)
    }

    /// Reports the current quota for `key`.
    pub fn snapshot(&self, key: &str) -> Snapshot {
        self.get_or_create(key).snapshot()
    }

    /// Drops buckets whose key has not been seen for at least `retention`.
    ///
    /// Buckets that a caller is still holding are kept. Returns the number
    /// of buckets removed.
    pub fn evict_idle(&self, retention: Duration) -> usize {
        let now = self.clock.now();
        let mut buckets = self.lock();
        let before = buckets.len();

        buckets.retain(|_, slot| {
            now.saturating_duration_since(slot.last_seen) < retention
                || Arc::strong_count(&slot.bucket) > 1
        });

        let evicted = before - buckets.len();
        if evicted > 0 {
            debug!(evicted, remaining = buckets.len(), "evicted idle buckets");
        }
        evicted
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    pub fn refill_rate(&self) -> usize {
        self.refill_rate
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
