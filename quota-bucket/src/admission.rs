use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::trace;

use super::Limiter;
use super::Reason;
use super::Strategy;

/// Turns a [`Limiter`] into a per-key admission decision.
///
/// Build one at start-up and clone it into every request path. Clones share
/// the same registry; creating a fresh `Admission` (and therefore a fresh
/// `Limiter`) per request would hand every request a full bucket.
#[derive(Clone, Debug)]
pub struct Admission {
    limiter: Arc<Limiter>,
}

impl Admission {
    pub fn new(limiter: Arc<Limiter>) -> Self {
        Self { limiter }
    }

    pub fn limiter(&self) -> &Arc<Limiter> {
        &self.limiter
    }
}

impl From<Limiter> for Admission {
    fn from(limiter: Limiter) -> Self {
        Self::new(Arc::new(limiter))
    }
}

impl Strategy for Admission {
    fn process(&self, key: &str) -> ControlFlow<Reason> {
        match self.limiter.get_or_create(key).try_take(1) {
            Ok(()) => {
                trace!(key, "admitted");
                ControlFlow::Continue(())
            }
            Err(snapshot) => {
                trace!(key, retry_after = snapshot.retry_after_secs(), "quota exceeded");
                ControlFlow::Break(Reason::QuotaExceeded {
                    limit: snapshot.limit,
                    retry_after: snapshot.retry_after,
                })
            }
        }
    }
}
