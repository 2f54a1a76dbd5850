use std::sync::Arc;

use tower::BoxError;
use tower::Service;
use tower::ServiceBuilder;
use tower::layer::util::Stack;
use tower::util::BoxCloneSyncService;

use quota_bucket::Admission;
use quota_bucket::Strategy;

use crate::KeyExtractor;
use crate::QuotaLayer;

/// Wrap `svc` with a per-key quota and box the result.
pub fn make_quota_svc<S, K, V, Req, Resp>(
    strategy: Arc<S>,
    extractor: K,
    svc: V,
) -> BoxCloneSyncService<Req, Resp, BoxError>
where
    S: Strategy + Send + Sync + 'static,
    K: KeyExtractor<Req> + Clone + Send + Sync + 'static,
    Req: Send + 'static,
    Resp: 'static,
    V: Service<Req, Response = Resp, Error = BoxError> + Clone + Send + Sync + 'static,
    <V as Service<Req>>::Future: Send + 'static,
{
    BoxCloneSyncService::new(
        ServiceBuilder::new()
            .layer(QuotaLayer::new(strategy, extractor))
            .service(svc),
    )
}

/// Service Builder Extension with additional useful functions for tower::ServiceBuilder.
pub trait ServiceBuilderExt<L> {
    /// Add a per-key quota layer backed by a shared [`Admission`].
    fn quota<K>(self, admission: Arc<Admission>, extractor: K)
    -> ServiceBuilder<Stack<QuotaLayer<Admission, K>, L>>;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn quota<K>(
        self,
        admission: Arc<Admission>,
        extractor: K,
    ) -> ServiceBuilder<Stack<QuotaLayer<Admission, K>, L>> {
        self.layer(QuotaLayer::new(admission, extractor))
    }
}
