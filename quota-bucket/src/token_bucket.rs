use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use crate::clock;
use crate::clock::Clock;
use crate::clock::Instant;

/// Conservative hint returned to an exhausted caller while tokens are still
/// being replenished.
const RETRY_AFTER_EXHAUSTED: Duration = Duration::from_secs(1);

/// A point-in-time view of a bucket's quota.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// Tokens currently available.
    pub remaining: usize,
    /// The bucket capacity.
    pub limit: usize,
    /// How long a caller should wait before trying again.
    ///
    /// Zero while tokens remain. Once exhausted this is a fixed one second
    /// hint if the bucket refills at all, and zero if it never refills.
    pub retry_after: Duration,
}

impl Snapshot {
    /// `retry_after` in whole seconds, as carried by a `Retry-After` header.
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after.as_secs()
    }
}

#[derive(Debug)]
struct State {
    tokens: usize,
    last_refill: Instant,
}

/// A single key's token bucket.
///
/// The bucket starts full and is replenished lazily: tokens are credited at
/// the moment of a request, in whole-second steps, so no background timer is
/// needed. All state transitions happen under the bucket's own lock, so any
/// number of threads may share one bucket without double-spending a token.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: usize,
    refill_rate: usize,
    state: Mutex<State>,
    clock: Clock,
}

impl TokenBucket {
    /// Creates a full bucket.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum number of tokens the bucket can hold.
    /// * `refill_rate` - Tokens credited per whole elapsed second.
    pub fn new(capacity: NonZeroUsize, refill_rate: usize) -> Self {
        Self::with_clock(capacity, refill_rate, Clock::new())
    }

    /// Creates a full bucket that reads time from `clock`.
    pub fn with_clock(capacity: NonZeroUsize, refill_rate: usize, clock: Clock) -> Self {
        let now = clock.now();
        Self {
            capacity: capacity.get(),
            refill_rate,
            state: Mutex::new(State {
                tokens: capacity.get(),
                last_refill: now,
            }),
            clock,
        }
    }

    /// Attempts to consume `n` tokens.
    ///
    /// Returns `true` and deducts the tokens if enough are available,
    /// otherwise returns `false` and leaves the balance untouched. Never
    /// waits for tokens to accrue.
    pub fn take(&self, n: usize) -> bool {
        self.try_take(n).is_ok()
    }

    /// Attempts to consume `n` tokens, reporting the quota on failure.
    ///
    /// The refill, the attempt and the returned [`Snapshot`] all come from
    /// one hold of the bucket lock, so a rejection always describes the
    /// balance that caused it.
    pub fn try_take(&self, n: usize) -> Result<(), Snapshot> {
        let mut state = self.lock();
        self.refill(&mut state);

        if n <= state.tokens {
            state.tokens -= n;
            Ok(())
        } else {
            Err(self.describe(&state))
        }
    }

    /// Reports the current quota after applying any pending refill.
    pub fn snapshot(&self) -> Snapshot {
        let mut state = self.lock();
        self.refill(&mut state);
        self.describe(&state)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn refill_rate(&self) -> usize {
        self.refill_rate
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Every update leaves `State` consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn describe(&self, state: &State) -> Snapshot {
        let remaining = state.tokens;
        let retry_after = if remaining > 0 || self.refill_rate == 0 {
            Duration::ZERO
        } else {
            RETRY_AFTER_EXHAUSTED
        };

        Snapshot {
            remaining,
            limit: self.capacity,
            retry_after,
        }
    }

    fn refill(&self, state: &mut State) {
        let now = self.clock.now();
        let seconds = clock::whole_seconds(state.last_refill, now);
        if seconds == 0 {
            return;
        }

        let added = usize::try_from(seconds)
            .unwrap_or(usize::MAX)
            .saturating_mul(self.refill_rate);
        state.tokens = state.tokens.saturating_add(added).min(self.capacity);

        // Only move forward by the whole seconds consumed, keeping the remainder.
        state.last_refill = clock::advance(state.last_refill, seconds);
    }
}
