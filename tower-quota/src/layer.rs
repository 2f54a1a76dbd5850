use std::sync::Arc;

use quota_bucket::Strategy;
use tower::Layer;

use crate::service::QuotaService;

/// Applies per-key quotas to requests.
#[derive(Debug)]
pub struct QuotaLayer<L, K>
where
    L: ?Sized,
{
    strategy: Arc<L>,
    extractor: K,
}

impl<L, K> Clone for QuotaLayer<L, K>
where
    L: ?Sized,
    K: Clone,
{
    fn clone(&self) -> Self {
        Self {
            strategy: Arc::clone(&self.strategy),
            extractor: self.extractor.clone(),
        }
    }
}

impl<L, K> QuotaLayer<L, K>
where
    L: Strategy + ?Sized,
{
    /// Create a QuotaLayer
    ///
    /// Every service produced by this layer shares `strategy`, so a client's
    /// quota is enforced across all of them.
    pub fn new(strategy: Arc<L>, extractor: K) -> Self {
        QuotaLayer {
            strategy,
            extractor,
        }
    }
}

impl<L, K, S> Layer<S> for QuotaLayer<L, K>
where
    L: ?Sized,
    K: Clone,
{
    type Service = QuotaService<L, S, K>;

    fn layer(&self, service: S) -> Self::Service {
        QuotaService::new(service, self.strategy.clone(), self.extractor.clone())
    }
}
