use std::num::NonZeroUsize;
use std::time::Duration;

/// Process-wide quota policy applied to every key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LimiterConfig {
    /// Bucket size, i.e. the burst a single key may consume at once.
    pub capacity: NonZeroUsize,
    /// Tokens credited per whole elapsed second.
    pub refill_rate: usize,
    /// Keys idle for longer than this are eligible for eviction.
    ///
    /// `None` keeps every bucket for the life of the process.
    pub idle_retention: Option<Duration>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            capacity: NonZeroUsize::new(10).expect("10 is non-zero"),
            refill_rate: 1,
            idle_retention: None,
        }
    }
}

impl LimiterConfig {
    pub fn new(capacity: NonZeroUsize, refill_rate: usize) -> Self {
        Self {
            capacity,
            refill_rate,
            idle_retention: None,
        }
    }

    pub fn with_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_refill_rate(mut self, refill_rate: usize) -> Self {
        self.refill_rate = refill_rate;
        self
    }

    pub fn with_idle_retention(mut self, retention: Duration) -> Self {
        self.idle_retention = Some(retention);
        self
    }
}
