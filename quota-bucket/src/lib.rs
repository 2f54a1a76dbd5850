//! # quota-bucket
//!
//! `quota-bucket` decides, per client key, whether a request should be admitted
//! or rejected based on a replenishing token quota.
//!
//! ## Core Philosophy
//!
//! Every key gets its own [`TokenBucket`]. Buckets start full, allowing a burst
//! of up to `capacity` requests, and are topped up by `refill_rate` tokens for
//! every whole second that passes. Nothing waits: a request either gets a
//! token immediately or is told to come back later.
//!
//! ## Key Concepts
//!
//! * **Lazy Evaluation**: Tokens are recalculated at the moment of the request,
//!   eliminating the need for background worker threads or timers.
//! * **Two-Level Locking**: The [`Limiter`] map lock is held only to find or
//!   create a bucket; each bucket then has its own lock. Different keys never
//!   contend with each other.
//! * **Strategy Trait**: [`Admission`] exposes the registry through [`Strategy`], a
//!   key to pass/fail interface that middleware can call without knowing
//!   about buckets.
//!
//! ## Example
//!
//! ```rust
//! use quota_bucket::Admission;
//! use quota_bucket::Limiter;
//! use quota_bucket::Strategy;
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//!
//! let capacity = NonZeroUsize::new(10).unwrap();
//! let limiter = Arc::new(Limiter::new(capacity, 1));
//! let admission = Admission::new(limiter.clone());
//!
//! if admission.process("203.0.113.7").is_continue() {
//!     // Request allowed
//! }
//! assert_eq!(limiter.snapshot("203.0.113.7").remaining, 9);
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::time::Duration;

mod admission;
pub mod clock;
mod config;
mod key;
mod limiter;
mod token_bucket;

pub use admission::Admission;
pub use config::LimiterConfig;
pub use key::client_key;
pub use limiter::Limiter;
pub use token_bucket::Snapshot;
pub use token_bucket::TokenBucket;

/// Reasons why a request might be rejected by a strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reason {
    /// The key has no tokens left.
    QuotaExceeded { limit: usize, retry_after: Duration },
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reason::QuotaExceeded { .. } => f.write_str("Too many requests.."),
        }
    }
}

impl std::error::Error for Reason {}

/// A keyed admission decision.
///
/// Strategies must be `Send` and `Sync` to be shared across request handlers
/// via `Arc`.
pub trait Strategy: Debug {
    /// Decides whether a single request for `key` may proceed.
    ///
    /// This method is non-blocking.
    ///
    /// # Errors
    ///
    /// Returns `Reason` if the key's quota has been exhausted.
    fn process(&self, key: &str) -> ControlFlow<Reason>;
}
