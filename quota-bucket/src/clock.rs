//! Time plumbing shared by the registry and its buckets.
//!
//! All timestamps come from a single [`Clock`]. In production this is
//! `Clock::new()`; in tests `Clock::mock()` hands back a controller that moves
//! time forward explicitly, so refill behaviour is fully deterministic.

use std::time::Duration;

pub use quanta::Clock;
pub use quanta::Instant;
pub use quanta::Mock;

/// Number of whole seconds between `since` and `now`.
///
/// Fractions of a second are dropped, not rounded. If `now` is earlier than
/// `since` the result is zero.
#[inline]
pub(crate) fn whole_seconds(since: Instant, now: Instant) -> u64 {
    now.saturating_duration_since(since).as_secs()
}

/// The instant exactly `seconds` whole seconds after `since`.
#[inline]
pub(crate) fn advance(since: Instant, seconds: u64) -> Instant {
    since + Duration::from_secs(seconds)
}
