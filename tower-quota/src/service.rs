use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Service;
use tracing::debug;

use quota_bucket::Strategy;

use crate::error::QuotaError;
use crate::key::KeyExtractor;

#[derive(Clone, Debug)]
struct QuotaServiceMetrics {
    admitted: Counter<u64>,
    rejected: Counter<u64>,
}

/// Admits or rejects each request according to its key's quota.
///
/// Rejection is immediate: the inner service is not called and the
/// response future resolves to [`QuotaError::QuotaExceeded`].
#[derive(Debug)]
pub struct QuotaService<L, S, K>
where
    L: ?Sized,
{
    inner: S,
    strategy: Arc<L>,
    extractor: K,
    instruments: QuotaServiceMetrics,
}

pin_project! {
    /// Either the inner service's future or an immediate rejection.
    #[project = ResponseFutureProj]
    pub enum ResponseFuture<F> {
        Admitted {
            #[pin]
            inner: F,
        },
        Rejected {
            error: QuotaError,
        },
    }
}

impl<F, T, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<T, E>>,
    E: From<BoxError>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            ResponseFutureProj::Admitted { inner } => inner.poll(cx),
            ResponseFutureProj::Rejected { error } => {
                Poll::Ready(Err(E::from(Box::new(error.clone()))))
            }
        }
    }
}

impl<L, S, K> Clone for QuotaService<L, S, K>
where
    L: ?Sized,
    S: Clone,
    K: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            strategy: Arc::clone(&self.strategy),
            extractor: self.extractor.clone(),
            instruments: self.instruments.clone(),
        }
    }
}

impl<L, S, K, Req> Service<Req> for QuotaService<L, S, K>
where
    L: Strategy + ?Sized + Send + Sync + 'static,
    S: Service<Req, Error = BoxError>,
    K: KeyExtractor<Req>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The quota is per request key, so it can only be checked in `call`.
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let key = self.extractor.extract(&req);

        match self.strategy.process(&key) {
            ControlFlow::Continue(()) => {
                self.instruments.admitted.add(1, &[]);
                ResponseFuture::Admitted {
                    inner: self.inner.call(req),
                }
            }
            ControlFlow::Break(reason) => {
                debug!(%key, %reason, "request rejected");
                self.instruments
                    .rejected
                    .add(1, &[KeyValue::new("reason", "quota_exceeded")]);
                ResponseFuture::Rejected {
                    error: QuotaError::from(reason),
                }
            }
        }
    }
}

impl<L, S, K> QuotaService<L, S, K>
where
    L: ?Sized,
{
    pub fn new(inner: S, strategy: Arc<L>, extractor: K) -> Self {
        let meter = global::meter("quota_service");
        let instruments = QuotaServiceMetrics {
            admitted: meter.u64_counter("admitted").build(),
            rejected: meter.u64_counter("rejected").build(),
        };

        Self {
            inner,
            strategy,
            extractor,
            instruments,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}
